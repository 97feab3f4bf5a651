use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command as GitCommand;

/// Which side of the index a path-scoped diff is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffScope {
    /// Index vs HEAD (`git diff --cached`).
    Staged,
    /// Working tree vs index (`git diff`).
    Unstaged,
    /// Working tree vs HEAD, for paths changed on both sides.
    Head,
}

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index status letter (`X`).
    pub staged: char,
    /// Working tree status letter (`Y`).
    pub unstaged: char,
    pub path: String,
    /// Source path of a rename or copy.
    pub orig_path: Option<String>,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.staged == '?' && self.unstaged == '?'
    }

    pub fn has_staged_change(&self) -> bool {
        matches!(self.staged, 'A' | 'M' | 'D' | 'R' | 'C' | 'T')
    }

    pub fn has_unstaged_change(&self) -> bool {
        matches!(self.unstaged, 'M' | 'D' | 'T')
    }
}

/// The first lines of a worktree file, plus its full line count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHead {
    pub lines: Vec<String>,
    pub total_lines: usize,
    /// A NUL byte in the first block; no lines are kept.
    pub binary: bool,
}

/// The version-control capability surface the pipeline consumes.
///
/// Read queries feed the change collector; the mutating half is only used by
/// the orchestrator once the user has approved a message.
pub trait Vcs: Send + Sync {
    fn is_repository(&self) -> bool;
    fn status(&self) -> Result<Vec<StatusEntry>>;
    /// Diff limited to `paths`; a rename passes its source and target.
    fn diff(&self, paths: &[&str], scope: DiffScope) -> Result<String>;
    /// Added/removed line counts over `paths` (`--numstat`).
    fn numstat(&self, paths: &[&str], scope: DiffScope) -> Result<(usize, usize)>;
    /// Up to `max_lines` lines of a worktree file, lossily decoded.
    fn read_head(&self, path: &str, max_lines: usize) -> Result<FileHead>;
    /// Repository-relative files below an untracked directory.
    fn list_dir(&self, path: &str) -> Result<Vec<String>>;
    fn recent_subjects(&self, count: usize) -> Result<Vec<String>>;

    fn head(&self) -> Result<Option<String>>;
    fn stage(&self, paths: &[String]) -> Result<()>;
    fn unstage_all(&self) -> Result<()>;
    fn commit(&self, message: &str) -> Result<String>;
    fn soft_reset(&self, rev: &str) -> Result<()>;
    fn current_branch(&self) -> Result<String>;
    fn upstream(&self) -> Result<Option<String>>;
    fn push(&self, branch: &str, set_upstream: bool) -> Result<()>;
}

/// `Vcs` backed by the `git` binary, run inside `root`.
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Run a git command and capture stdout as String.
    fn git_output(&self, args: &[&str]) -> Result<String> {
        let output = GitCommand::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .with_context(|| format!("failed to run git {:?}", args))?;

        if !output.status.success() {
            return Err(anyhow!(
                "git {:?} exited with status {:?}: {}",
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn scope_args(scope: DiffScope) -> &'static [&'static str] {
        match scope {
            DiffScope::Staged => &["diff", "-M", "--cached"],
            DiffScope::Unstaged => &["diff", "-M"],
            DiffScope::Head => &["diff", "-M", "HEAD"],
        }
    }
}

impl Vcs for GitCli {
    fn is_repository(&self) -> bool {
        self.git_output(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn status(&self) -> Result<Vec<StatusEntry>> {
        let out = self.git_output(&["status", "--porcelain", "--untracked-files=normal"])?;
        Ok(parse_porcelain(&out))
    }

    fn diff(&self, paths: &[&str], scope: DiffScope) -> Result<String> {
        let mut args: Vec<&str> = Self::scope_args(scope).to_vec();
        args.push("--");
        args.extend_from_slice(paths);
        self.git_output(&args)
    }

    fn numstat(&self, paths: &[&str], scope: DiffScope) -> Result<(usize, usize)> {
        let mut args: Vec<&str> = Self::scope_args(scope).to_vec();
        args.extend(["--numstat", "--"]);
        args.extend_from_slice(paths);
        let out = self.git_output(&args)?;
        Ok(parse_numstat(&out))
    }

    fn read_head(&self, path: &str, max_lines: usize) -> Result<FileHead> {
        let full = self.root.join(path);
        let file = File::open(&full).with_context(|| format!("failed to open {:?}", full))?;
        let mut reader = BufReader::new(file);

        if reader.fill_buf()?.contains(&0) {
            return Ok(FileHead {
                binary: true,
                ..FileHead::default()
            });
        }

        let mut head = FileHead::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            head.total_lines += 1;
            if head.lines.len() < max_lines {
                let line = String::from_utf8_lossy(&buf);
                head.lines.push(line.trim_end_matches(['\n', '\r']).to_string());
            }
        }
        Ok(head)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        walk(&self.root, &self.root.join(path), &mut out)?;
        out.sort();
        Ok(out)
    }

    fn recent_subjects(&self, count: usize) -> Result<Vec<String>> {
        let n = format!("-{count}");
        // A repository without commits has no log.
        let out = match self.git_output(&["log", &n, "--pretty=format:%s"]) {
            Ok(out) => out,
            Err(e) => {
                log::debug!("no recent commits: {e}");
                return Ok(Vec::new());
            }
        };
        Ok(out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn head(&self) -> Result<Option<String>> {
        match self.git_output(&["rev-parse", "--verify", "-q", "HEAD"]) {
            Ok(out) => Ok(Some(out.trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    fn stage(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["add", "-A", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git_output(&args)?;
        Ok(())
    }

    fn unstage_all(&self) -> Result<()> {
        if self.head()?.is_some() {
            self.git_output(&["reset", "-q"])?;
        } else {
            // No HEAD to reset to yet: drop everything from the index instead.
            self.git_output(&["rm", "-r", "-q", "--cached", "--ignore-unmatch", "."])?;
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.git_output(&["commit", "-q", "-m", message])?;
        self.head()?
            .ok_or_else(|| anyhow!("commit succeeded but HEAD is unresolved"))
    }

    fn soft_reset(&self, rev: &str) -> Result<()> {
        self.git_output(&["reset", "--soft", rev])?;
        Ok(())
    }

    /// Get the current branch name.
    fn current_branch(&self) -> Result<String> {
        let name = self
            .git_output(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string();
        Ok(name)
    }

    fn upstream(&self) -> Result<Option<String>> {
        match self.git_output(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"]) {
            Ok(out) if !out.trim().is_empty() => Ok(Some(out.trim().to_string())),
            _ => Ok(None),
        }
    }

    fn push(&self, branch: &str, set_upstream: bool) -> Result<()> {
        if set_upstream {
            log::info!("Pushing {branch} and setting upstream to origin/{branch}");
            self.git_output(&["push", "--set-upstream", "origin", branch])?;
        } else {
            log::info!("Pushing {branch}");
            self.git_output(&["push", "origin", branch])?;
        }
        Ok(())
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

/// Parse `git status --porcelain` (v1) output.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let mut chars = line.chars();
            let staged = chars.next()?;
            let unstaged = chars.next()?;
            let rest = line.get(3..)?;

            let (orig_path, path) = match rest.split_once(" -> ") {
                Some((from, to)) if matches!(staged, 'R' | 'C') => {
                    (Some(unquote(from)), unquote(to))
                }
                _ => (None, unquote(rest)),
            };

            Some(StatusEntry {
                staged,
                unstaged,
                path,
                orig_path,
            })
        })
        .collect()
}

/// Parse `--numstat` output, summing every row. Binary files report `-`.
pub fn parse_numstat(output: &str) -> (usize, usize) {
    output.lines().fold((0, 0), |(added, removed), line| {
        let mut cols = line.split('\t');
        let a = cols.next().and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let r = cols.next().and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        (added + a, removed + r)
    })
}

/// Strip the C-style quoting git applies to unusual path names.
fn unquote(path: &str) -> String {
    let trimmed = path.trim();
    match trimmed.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => trimmed.to_string(),
    }
}

/// First path segment before the first separator; root-level files have none.
pub fn scope_for_path(path: &str) -> Option<String> {
    let trimmed = path.trim_start_matches("./");
    match trimmed.split_once('/') {
        Some((first, rest)) if !first.is_empty() && !rest.is_empty() => Some(first.to_string()),
        _ => None,
    }
}
