//! Change collection: turn `git status` into a bounded [`ChangeAnalysis`].
//!
//! Collection is read-only and total over the reported status set. A query
//! that fails for one path downgrades that path to a "best-effort unknown"
//! record instead of aborting the run; only a failing status query is fatal.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use anyhow::{Context, Result};

use crate::git::{DiffScope, FileHead, StatusEntry, Vcs, scope_for_path};
use crate::signals::{self, Signal};

/// Lines of a new file read for its excerpt and signal scan.
pub const EXCERPT_LINES: usize = 100;
/// Sub-files listed for an untracked directory.
const DIR_LISTING_CAP: usize = 10;
/// Lines kept in the aggregated "interesting lines" excerpt.
const DIFF_EXCERPT_CAP: usize = 120;
pub const UNKNOWN_HINT: &str = "best-effort: change details unavailable";
const BINARY_HINT: &str = "binary file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    fn from_letter(letter: char) -> Self {
        match letter {
            'A' | 'C' | '?' => ChangeKind::Added,
            'D' => ChangeKind::Deleted,
            'R' => ChangeKind::Renamed,
            _ => ChangeKind::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::Renamed => "Renamed",
        }
    }

    pub fn letter(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
            ChangeKind::Renamed => 'R',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One touched path.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub path: String,
    pub orig_path: Option<String>,
    pub kind: ChangeKind,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Total line count of a new file (or file count of a new directory).
    pub size_lines: Option<usize>,
    pub content_excerpt: Option<String>,
    pub signals: BTreeSet<Signal>,
    /// One-line semantic hint, empty when nothing was recognised.
    pub hint: String,
    /// Bounded unified diff (synthesised for new files).
    pub diff: String,
    pub is_dir: bool,
}

impl ChangeRecord {
    fn bare(path: &str, kind: ChangeKind) -> Self {
        ChangeRecord {
            path: path.to_string(),
            orig_path: None,
            kind,
            lines_added: 0,
            lines_removed: 0,
            size_lines: None,
            content_excerpt: None,
            signals: BTreeSet::new(),
            hint: String::new(),
            diff: String::new(),
            is_dir: false,
        }
    }

    pub fn scope(&self) -> Option<String> {
        scope_for_path(&self.path)
    }

    /// `+a -r` for modified files, line count for new ones.
    pub fn stat(&self) -> String {
        match (self.kind, self.size_lines) {
            (ChangeKind::Added, Some(n)) if self.is_dir => format!("{n} files"),
            (ChangeKind::Added, Some(n)) => format!("{n} lines"),
            (ChangeKind::Modified | ChangeKind::Renamed, _) => {
                format!("+{} -{}", self.lines_added, self.lines_removed)
            }
            _ => String::new(),
        }
    }
}

/// Everything the prompt builder knows about the pending change set.
#[derive(Debug, Clone, Default)]
pub struct ChangeAnalysis {
    /// Discovery order: staged, unstaged, untracked.
    pub records: Vec<ChangeRecord>,
    pub diff_excerpt: String,
    pub total_additions: usize,
    pub total_deletions: usize,
}

impl ChangeAnalysis {
    pub fn from_records(records: Vec<ChangeRecord>) -> Self {
        let total_additions = records
            .iter()
            .map(|r| match r.kind {
                ChangeKind::Added => r.size_lines.unwrap_or(0),
                _ => r.lines_added,
            })
            .sum();
        let total_deletions = records.iter().map(|r| r.lines_removed).sum();
        let diff_excerpt = build_excerpt(&records);

        ChangeAnalysis {
            records,
            diff_excerpt,
            total_additions,
            total_deletions,
        }
    }

    /// Analysis restricted to a single record (atomic mode).
    pub fn for_record(&self, index: usize) -> Option<ChangeAnalysis> {
        self.records
            .get(index)
            .map(|r| ChangeAnalysis::from_records(vec![r.clone()]))
    }

    pub fn combined_diff(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            if record.diff.is_empty() {
                continue;
            }
            out.push_str(&record.diff);
            if !record.diff.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    /// One line per file: `M src/lib.rs (+3 -1): defines functions`.
    pub fn status_summary(&self) -> String {
        let mut out = String::new();
        for r in &self.records {
            out.push(r.kind.letter());
            out.push(' ');
            out.push_str(&r.path);
            if let Some(orig) = &r.orig_path {
                out.push_str(&format!(" (from {orig})"));
            }
            let stat = r.stat();
            if !stat.is_empty() {
                out.push_str(&format!(" ({stat})"));
            }
            if !r.hint.is_empty() {
                out.push_str(": ");
                out.push_str(&r.hint);
            }
            out.push('\n');
        }
        out
    }
}

/// Reads repository state through a [`Vcs`].
pub struct Collector<'a> {
    vcs: &'a dyn Vcs,
    max_diff_lines: usize,
}

impl<'a> Collector<'a> {
    pub fn new(vcs: &'a dyn Vcs, max_diff_lines: usize) -> Self {
        Self {
            vcs,
            max_diff_lines,
        }
    }

    /// Collect the pending change set; `None` when the tree is clean.
    pub fn collect(&self) -> Result<Option<ChangeAnalysis>> {
        let entries = self
            .vcs
            .status()
            .context("failed to query repository status")?;

        if entries.is_empty() {
            return Ok(None);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::with_capacity(entries.len());

        let staged = entries.iter().filter(|e| e.has_staged_change());
        let unstaged = entries
            .iter()
            .filter(|e| !e.has_staged_change() && e.has_unstaged_change());
        let untracked = entries.iter().filter(|e| e.is_untracked());

        for entry in staged.chain(unstaged).chain(untracked) {
            if !seen.insert(entry.path.clone()) {
                continue;
            }
            records.push(self.record_for(entry));
        }

        if records.is_empty() {
            return Ok(None);
        }

        log::debug!("Collected {} changed path(s)", records.len());
        Ok(Some(ChangeAnalysis::from_records(records)))
    }

    fn record_for(&self, entry: &StatusEntry) -> ChangeRecord {
        let (letter, scope) = if entry.is_untracked() {
            ('?', DiffScope::Unstaged)
        } else if entry.has_staged_change() && entry.has_unstaged_change() {
            (entry.staged, DiffScope::Head)
        } else if entry.has_staged_change() {
            (entry.staged, DiffScope::Staged)
        } else {
            (entry.unstaged, DiffScope::Unstaged)
        };
        let kind = ChangeKind::from_letter(letter);

        let result = match kind {
            ChangeKind::Added if entry.path.ends_with('/') => self.new_directory(&entry.path),
            ChangeKind::Added => self.new_file(&entry.path),
            ChangeKind::Modified | ChangeKind::Renamed => {
                let mut pathspec: Vec<&str> = entry.orig_path.iter().map(String::as_str).collect();
                pathspec.push(&entry.path);
                self.modified_file(&entry.path, &pathspec, kind, scope)
            }
            ChangeKind::Deleted => Ok(ChangeRecord::bare(&entry.path, kind)),
        };

        let mut record = result.unwrap_or_else(|e| {
            log::warn!("Could not inspect {}: {e:#}", entry.path);
            let mut r = ChangeRecord::bare(entry.path.trim_end_matches('/'), kind);
            r.hint = UNKNOWN_HINT.to_string();
            r
        });
        record.orig_path = entry.orig_path.clone();
        record
    }

    fn new_file(&self, path: &str) -> Result<ChangeRecord> {
        let head = self.vcs.read_head(path, EXCERPT_LINES.max(self.max_diff_lines))?;

        let mut record = ChangeRecord::bare(path, ChangeKind::Added);
        if head.binary {
            record.hint = BINARY_HINT.to_string();
            return Ok(record);
        }

        let excerpt = &head.lines[..head.lines.len().min(EXCERPT_LINES)];
        record.size_lines = Some(head.total_lines);
        record.signals = signals::scan_content(excerpt.iter().map(String::as_str));
        record.hint = signals::render_hint(&record.signals);
        record.content_excerpt = Some(excerpt.join("\n"));
        record.diff = synthesize_new_file_diff(path, &head, self.max_diff_lines);
        Ok(record)
    }

    fn new_directory(&self, path: &str) -> Result<ChangeRecord> {
        let files = self.vcs.list_dir(path.trim_end_matches('/'))?;
        let dir = path.trim_end_matches('/');

        let mut listing = format!("New directory with {} files", files.len());
        for f in files.iter().take(DIR_LISTING_CAP) {
            listing.push_str("\n  ");
            listing.push_str(f);
        }
        if files.len() > DIR_LISTING_CAP {
            listing.push_str(&format!("\n  ... and {} more", files.len() - DIR_LISTING_CAP));
        }

        let mut record = ChangeRecord::bare(dir, ChangeKind::Added);
        record.is_dir = true;
        record.size_lines = Some(files.len());
        record.hint = format!("new directory with {} files", files.len());
        record.diff = format!(
            "--- /dev/null\n+++ b/{dir}/\n{}\n",
            listing
                .lines()
                .map(|l| format!("+{l}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        record.content_excerpt = Some(listing);
        Ok(record)
    }

    fn modified_file(
        &self,
        path: &str,
        pathspec: &[&str],
        kind: ChangeKind,
        scope: DiffScope,
    ) -> Result<ChangeRecord> {
        let (added, removed) = self.vcs.numstat(pathspec, scope)?;
        let diff = self.vcs.diff(pathspec, scope)?;

        let mut record = ChangeRecord::bare(path, kind);
        record.lines_added = added;
        record.lines_removed = removed;
        record.signals = signals::scan_diff(&diff);
        record.hint = signals::render_hint(&record.signals);
        record.diff = bound_lines(&diff, self.max_diff_lines);
        Ok(record)
    }
}

fn synthesize_new_file_diff(path: &str, head: &FileHead, max_lines: usize) -> String {
    let shown = head.lines.len().min(max_lines);
    let mut diff = format!("--- /dev/null\n+++ b/{path}\n");
    for line in &head.lines[..shown] {
        diff.push('+');
        diff.push_str(line);
        diff.push('\n');
    }
    if head.total_lines > shown {
        diff.push_str(&format!("... [truncated: {} more lines]", head.total_lines - shown));
    }
    diff
}

fn build_excerpt(records: &[ChangeRecord]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for record in records {
        let interesting: Vec<&str> = record
            .diff
            .lines()
            .filter(|l| signals::is_interesting_diff_line(l))
            .collect();
        if interesting.is_empty() {
            continue;
        }
        lines.push(format!("## {}", record.path));
        lines.extend(interesting.into_iter().map(str::to_string));
    }
    if lines.len() > DIFF_EXCERPT_CAP {
        let dropped = lines.len() - DIFF_EXCERPT_CAP;
        lines.truncate(DIFF_EXCERPT_CAP);
        lines.push(format!("... [{dropped} more lines]"));
    }
    lines.join("\n")
}

/// Keep the first `max` lines, noting how many were dropped.
pub fn bound_lines(text: &str, max: usize) -> String {
    let total = text.lines().count();
    if total <= max {
        return text.to_string();
    }
    let mut out: Vec<&str> = text.lines().take(max).collect();
    let note = format!("... [truncated: {} more lines]", total - max);
    out.push(&note);
    out.join("\n")
}
