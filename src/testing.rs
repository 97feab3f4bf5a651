//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use indicatif::ProgressBar;

use crate::error::BackendError;
use crate::extract::ExtractedMessage;
use crate::git::{DiffScope, FileHead, GitCli, StatusEntry, Vcs, parse_porcelain};
use crate::llm::{Backend, BackendKind, BackendReply};
use crate::orchestrator::CommitPlan;
use crate::ui::{ReviewAction, Ui};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An empty repository in a temp directory, with a committer configured.
pub fn scratch_repo() -> (tempfile::TempDir, GitCli) {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["config", "user.name", "Smart Commit Tests"]);
    git(dir.path(), &["config", "user.email", "tests@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    let vcs = GitCli::new(dir.path());
    (dir, vcs)
}

/// Run git in `dir` and return its stdout; panics when git fails.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git").arg("-C").arg(dir).args(args).output().unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn write_file(dir: &Path, path: &str, content: &str) {
    fs::write(dir.join(path), content).unwrap();
}

#[derive(Default)]
struct VcsState {
    head: Option<String>,
    commits: usize,
    upstream: Option<String>,
    fail_push: bool,
    log: Vec<String>,
}

/// A repository held in memory. Mutations are recorded, not applied.
#[derive(Default)]
pub struct MemoryVcs {
    entries: Vec<StatusEntry>,
    diffs: HashMap<String, (String, (usize, usize))>,
    files: HashMap<String, String>,
    dirs: HashMap<String, Vec<String>>,
    subjects: Vec<String>,
    status_fails: bool,
    state: Mutex<VcsState>,
}

impl MemoryVcs {
    /// Add porcelain status line(s).
    pub fn with_status(mut self, line: &str) -> Self {
        self.entries.extend(parse_porcelain(line));
        self
    }

    /// Diff for a pathspec; a rename is keyed `"old new"`.
    pub fn with_diff(mut self, pathspec: &str, diff: &str, numstat: (usize, usize)) -> Self {
        self.diffs.insert(pathspec.to_string(), (diff.to_string(), numstat));
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_dir(mut self, path: &str, files: Vec<String>) -> Self {
        self.dirs.insert(path.to_string(), files);
        self
    }

    pub fn with_subjects(mut self, subjects: &[&str]) -> Self {
        self.subjects = subjects.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_head(self, rev: &str) -> Self {
        lock(&self.state).head = Some(rev.to_string());
        self
    }

    pub fn with_upstream(self, upstream: &str) -> Self {
        lock(&self.state).upstream = Some(upstream.to_string());
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.status_fails = true;
        self
    }

    pub fn failing_push(self) -> Self {
        lock(&self.state).fail_push = true;
        self
    }

    /// Every mutation so far, in order.
    pub fn log(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }

    fn record(&self, entry: String) {
        lock(&self.state).log.push(entry);
    }
}

impl Vcs for MemoryVcs {
    fn is_repository(&self) -> bool {
        true
    }

    fn status(&self) -> Result<Vec<StatusEntry>> {
        if self.status_fails {
            bail!("fatal: unable to read index");
        }
        Ok(self.entries.clone())
    }

    fn diff(&self, paths: &[&str], _scope: DiffScope) -> Result<String> {
        let key = paths.join(" ");
        self.diffs
            .get(&key)
            .map(|(diff, _)| diff.clone())
            .ok_or_else(|| anyhow!("no diff for {key}"))
    }

    fn numstat(&self, paths: &[&str], _scope: DiffScope) -> Result<(usize, usize)> {
        let key = paths.join(" ");
        self.diffs
            .get(&key)
            .map(|(_, stat)| *stat)
            .ok_or_else(|| anyhow!("no numstat for {key}"))
    }

    fn read_head(&self, path: &str, max_lines: usize) -> Result<FileHead> {
        self.files
            .get(path)
            .map(|text| file_head(text, max_lines))
            .ok_or_else(|| anyhow!("no such file {path}"))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such directory {path}"))
    }

    fn recent_subjects(&self, count: usize) -> Result<Vec<String>> {
        Ok(self.subjects.iter().take(count).cloned().collect())
    }

    fn head(&self) -> Result<Option<String>> {
        Ok(lock(&self.state).head.clone())
    }

    fn stage(&self, paths: &[String]) -> Result<()> {
        self.record(format!("stage {}", paths.join(" ")));
        Ok(())
    }

    fn unstage_all(&self) -> Result<()> {
        self.record("unstage_all".to_string());
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut state = lock(&self.state);
        state.commits += 1;
        let id = format!("c{}", state.commits);
        state.head = Some(id.clone());
        state.log.push(format!("commit {message}"));
        Ok(id)
    }

    fn soft_reset(&self, rev: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.head = Some(rev.to_string());
        state.log.push(format!("reset {rev}"));
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        Ok("main".to_string())
    }

    fn upstream(&self) -> Result<Option<String>> {
        Ok(lock(&self.state).upstream.clone())
    }

    fn push(&self, branch: &str, set_upstream: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_push {
            bail!("remote rejected");
        }
        let flag = if set_upstream { " -u" } else { "" };
        state.log.push(format!("push {branch}{flag}"));
        Ok(())
    }
}

/// Split in-memory text the way `GitCli::read_head` splits a file.
fn file_head(text: &str, max_lines: usize) -> FileHead {
    if text.contains('\0') {
        return FileHead {
            binary: true,
            ..FileHead::default()
        };
    }
    FileHead {
        lines: text.lines().take(max_lines).map(str::to_string).collect(),
        total_lines: text.lines().count(),
        binary: false,
    }
}

enum Script {
    Reply(String, Duration),
    Fail,
}

/// Backend answering from a script keyed on prompt substrings.
///
/// Rules are checked in insertion order; an unmatched prompt is a
/// malformed reply.
#[derive(Default)]
pub struct ScriptedBackend {
    rules: Vec<(String, Script)>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedBackend {
    /// Answer every prompt with `reply`.
    pub fn replying(reply: &str) -> Self {
        Self::default().on("", reply)
    }

    pub fn on(self, needle: &str, reply: &str) -> Self {
        self.slow(needle, reply, Duration::ZERO)
    }

    pub fn slow(mut self, needle: &str, reply: &str, delay: Duration) -> Self {
        self.rules
            .push((needle.to_string(), Script::Reply(reply.to_string(), delay)));
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Fail));
        self
    }

    /// Prompt and timeout of every call, in call order.
    pub fn calls(&self) -> Vec<(String, Duration)> {
        lock(&self.calls).clone()
    }
}

impl Backend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn call(&self, prompt: &str, timeout: Duration) -> Result<BackendReply, BackendError> {
        lock(&self.calls).push((prompt.to_string(), timeout));

        let script = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, script)| script);

        match script {
            Some(Script::Reply(text, delay)) => {
                if !delay.is_zero() {
                    thread::sleep(*delay);
                }
                Ok(BackendReply {
                    raw_text: text.clone(),
                    backend_kind: BackendKind::Native,
                })
            }
            Some(Script::Fail) => Err(BackendError::Connection("connection refused".to_string())),
            None => Err(BackendError::MalformedResponse("no scripted reply".to_string())),
        }
    }

    fn probe(&self, _timeout: Duration) -> bool {
        true
    }
}

/// UI with canned answers that records what it was asked to show.
pub struct ScriptedUi {
    confirm: bool,
    reviews: Mutex<VecDeque<ReviewAction>>,
    edits: Mutex<VecDeque<Option<String>>>,
    amends: Mutex<VecDeque<usize>>,
    output: Mutex<Vec<String>>,
}

impl Default for ScriptedUi {
    fn default() -> Self {
        Self {
            confirm: true,
            reviews: Mutex::default(),
            edits: Mutex::default(),
            amends: Mutex::default(),
            output: Mutex::default(),
        }
    }
}

impl ScriptedUi {
    pub fn declining() -> Self {
        Self {
            confirm: false,
            ..Self::default()
        }
    }

    pub fn with_review(self, action: ReviewAction) -> Self {
        lock(&self.reviews).push_back(action);
        self
    }

    pub fn with_edit(self, text: Option<&str>) -> Self {
        lock(&self.edits).push_back(text.map(str::to_string));
        self
    }

    pub fn with_amend(self, index: usize) -> Self {
        lock(&self.amends).push_back(index);
        self
    }

    pub fn output(&self) -> Vec<String> {
        lock(&self.output).clone()
    }

    fn say(&self, line: String) {
        lock(&self.output).push(line);
    }
}

impl Ui for ScriptedUi {
    fn status(&self, text: &str) {
        self.say(format!("status: {text}"));
    }

    fn warn(&self, text: &str) {
        self.say(format!("warn: {text}"));
    }

    fn success(&self, text: &str) {
        self.say(format!("success: {text}"));
    }

    fn show_message(&self, message: &ExtractedMessage) {
        self.say(format!("message: {}", message.text));
    }

    fn show_plan(&self, plan: &CommitPlan) {
        self.say(format!("plan: {} entries", plan.entries.len()));
    }

    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.confirm)
    }

    fn review_plan(&self, _plan: &CommitPlan) -> Result<ReviewAction> {
        Ok(lock(&self.reviews).pop_front().unwrap_or(ReviewAction::Approve))
    }

    fn edit_message(&self, _label: &str, _current: &str) -> Result<Option<String>> {
        Ok(lock(&self.edits).pop_front().flatten())
    }

    fn select_amend(&self, _plan: &CommitPlan) -> Result<Option<usize>> {
        Ok(lock(&self.amends).pop_front())
    }

    fn progress(&self, _len: u64, _label: &str) -> ProgressBar {
        ProgressBar::hidden()
    }

    fn spinner(&self, _label: &str) -> ProgressBar {
        ProgressBar::hidden()
    }
}
