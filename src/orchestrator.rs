//! Drives a run end to end: collect, prompt, call, extract, review, commit.
//!
//! Whole-repository mode produces one commit for everything pending. Atomic
//! mode produces one commit per changed path in two phases: every message is
//! generated (optionally in parallel) before the first commit is created, so
//! the whole batch can be reviewed and edited without touching the repository.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::collector::{ChangeAnalysis, Collector};
use crate::error::{BackendError, RepositoryError};
use crate::extract::{ExtractedMessage, Extractor};
use crate::git::Vcs;
use crate::llm::prompt_builder::{self, MAX_RECENT_SUBJECTS, PromptMode, PromptRequest};
use crate::llm::{Backend, truncate_for_log};
use crate::signals;
use crate::ui::{ReviewAction, Ui, short_id};

/// Diff sizes (in chars) at which the detailed-mode timeout steps up.
const TIMEOUT_STEPS: [usize; 3] = [2_000, 8_000, 20_000];
/// Per-tier multipliers in halves: x1, x1.5, x2, x3.
const TIMEOUT_HALVES: [u32; 4] = [2, 3, 4, 6];
/// Share of changed lines that open a definition above which a change
/// counts as dense and gets one extra tier.
const DENSE_CHANGE_RATIO: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub mode: PromptMode,
    pub character_limit: usize,
    /// Base for the adaptive detailed-mode timeout.
    pub timeout: Duration,
    /// Fixed timeout for fast-mode calls, including the degraded retry.
    pub fast_timeout: Duration,
    pub jobs: usize,
    pub auto_push: bool,
    pub max_diff_lines: usize,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome<T> {
    NoChanges,
    DryRun(T),
    Cancelled(T),
    Committed(T),
}

/// Ordered per-file commits for atomic mode.
#[derive(Debug, Clone)]
pub struct CommitPlan {
    /// HEAD before the first commit; `None` in a repository without history.
    pub base: Option<String>,
    /// Discovery order, which is also commit order.
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub path: String,
    pub orig_path: Option<String>,
    pub message: ExtractedMessage,
    /// Set once the commit exists.
    pub commit_id: Option<String>,
}

impl PlanEntry {
    /// Paths to stage for this entry; renames also stage the old path.
    fn paths(&self) -> Vec<String> {
        self.orig_path
            .iter()
            .chain(std::iter::once(&self.path))
            .cloned()
            .collect()
    }
}

/// Scale the base timeout by diff size, bumping one tier for dense changes.
pub fn adaptive_timeout(base: Duration, analysis: &ChangeAnalysis) -> Duration {
    let diff = analysis.combined_diff();
    let size = diff.chars().count();

    let mut tier = TIMEOUT_STEPS.iter().filter(|&&step| size >= step).count();
    if structural_density(&diff) >= DENSE_CHANGE_RATIO {
        tier = (tier + 1).min(TIMEOUT_HALVES.len() - 1);
    }

    let timeout = base.saturating_mul(TIMEOUT_HALVES[tier]) / 2;
    log::debug!("Adaptive timeout: {size} diff chars, tier {tier}, {}s", timeout.as_secs());
    timeout
}

fn structural_density(diff: &str) -> f64 {
    let changed: Vec<&str> = diff
        .lines()
        .filter(|l| {
            (l.starts_with('+') && !l.starts_with("+++")) || (l.starts_with('-') && !l.starts_with("---"))
        })
        .collect();
    if changed.is_empty() {
        return 0.0;
    }
    let structural = changed.iter().filter(|l| signals::is_definition_line(l)).count();
    structural as f64 / changed.len() as f64
}

/// Paths staged by the guard are unstaged again unless released.
struct StagingArea<'a> {
    vcs: &'a dyn Vcs,
    armed: bool,
}

impl<'a> StagingArea<'a> {
    fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs, armed: false }
    }

    fn stage(&mut self, paths: &[String]) -> Result<()> {
        self.armed = true;
        self.vcs
            .stage(paths)
            .with_context(|| format!("failed to stage {}", paths.join(", ")))
    }

    fn release(mut self) {
        self.armed = false;
    }
}

impl Drop for StagingArea<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.vcs.unstage_all() {
                log::warn!("failed to clear the staging area: {e:#}");
            }
        }
    }
}

pub struct Orchestrator<'a> {
    vcs: &'a dyn Vcs,
    backend: &'a dyn Backend,
    ui: &'a dyn Ui,
    extractor: Extractor,
    settings: RunSettings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        vcs: &'a dyn Vcs,
        backend: &'a dyn Backend,
        ui: &'a dyn Ui,
        extractor: Extractor,
        settings: RunSettings,
    ) -> Self {
        Self {
            vcs,
            backend,
            ui,
            extractor,
            settings,
        }
    }

    /// One commit for every pending change.
    pub fn run(&self, dry_run: bool) -> Result<RunOutcome<ExtractedMessage>> {
        let Some(analysis) = self.collect()? else {
            self.ui.status(&format!("Nothing to commit: {}", RepositoryError::NoChanges));
            return Ok(RunOutcome::NoChanges);
        };
        self.ui.status(&format!(
            "Found {} changed path(s), +{} -{} lines",
            analysis.records.len(),
            analysis.total_additions,
            analysis.total_deletions
        ));

        let recent = self.recent_subjects();
        let spinner = self.ui.spinner("Generating commit message...");
        let generated = self.generate(&analysis, &recent);
        spinner.finish_and_clear();
        let message = generated?;

        self.ui.show_message(&message);
        if dry_run {
            self.ui.status("Dry run: nothing was staged or committed.");
            return Ok(RunOutcome::DryRun(message));
        }

        if !self.ui.confirm("Commit all changes with this message?")? {
            self.ui.status("Cancelled: nothing was staged or committed.");
            return Ok(RunOutcome::Cancelled(message));
        }

        let paths: Vec<String> = analysis
            .records
            .iter()
            .flat_map(|r| r.orig_path.iter().chain(std::iter::once(&r.path)))
            .cloned()
            .collect();

        // Staged deletions and rename sources only exist in the index, so
        // start from an empty one or `git add` rejects their paths.
        self.vcs
            .unstage_all()
            .context("failed to clear the staging area")?;
        let mut staging = StagingArea::new(self.vcs);
        staging.stage(&paths)?;
        let id = self.vcs.commit(&message.text).context("failed to create commit")?;
        staging.release();

        self.ui.success(&format!("[{}] {}", short_id(&id), message.text));
        self.push_if_enabled();
        Ok(RunOutcome::Committed(message))
    }

    /// One commit per changed path, generated and reviewed before any commit.
    pub fn run_atomic(&self, dry_run: bool) -> Result<RunOutcome<CommitPlan>> {
        let Some(analysis) = self.collect()? else {
            self.ui.status(&format!("Nothing to commit: {}", RepositoryError::NoChanges));
            return Ok(RunOutcome::NoChanges);
        };

        let base = self.vcs.head().context("failed to resolve HEAD")?;
        let recent = self.recent_subjects();
        let entries = self.generate_all(&analysis, &recent);

        let skipped = analysis.records.len() - entries.len();
        if skipped > 0 {
            self.ui.warn(&format!("Skipped {skipped} file(s) the backend could not describe"));
        }
        if entries.is_empty() {
            bail!("could not generate a commit message for any changed file");
        }

        let mut plan = CommitPlan { base, entries };
        self.ui.show_plan(&plan);

        if dry_run {
            self.ui.status("Dry run: nothing was staged or committed.");
            return Ok(RunOutcome::DryRun(plan));
        }

        loop {
            match self.ui.review_plan(&plan)? {
                ReviewAction::Approve => break,
                ReviewAction::Cancel => {
                    self.ui.status("Cancelled: nothing was staged or committed.");
                    return Ok(RunOutcome::Cancelled(plan));
                }
                ReviewAction::Edit(index) => {
                    if self.edit_entry(&mut plan, index)? {
                        self.ui.show_plan(&plan);
                    }
                }
            }
        }

        self.vcs
            .unstage_all()
            .context("failed to clear the staging area")?;
        for index in 0..plan.entries.len() {
            self.commit_entry(&mut plan, index)?;
        }

        while let Some(index) = self.ui.select_amend(&plan)? {
            self.reword(&mut plan, index)?;
        }

        self.push_if_enabled();
        Ok(RunOutcome::Committed(plan))
    }

    fn collect(&self) -> Result<Option<ChangeAnalysis>> {
        Collector::new(self.vcs, self.settings.max_diff_lines).collect()
    }

    fn recent_subjects(&self) -> Vec<String> {
        self.vcs
            .recent_subjects(MAX_RECENT_SUBJECTS)
            .unwrap_or_else(|e| {
                log::debug!("no recent subjects: {e:#}");
                Vec::new()
            })
    }

    /// Generate a message, degrading once from detailed to fast mode.
    fn generate(&self, analysis: &ChangeAnalysis, recent: &[String]) -> Result<ExtractedMessage> {
        let summary = analysis.status_summary();
        let limit = self.settings.character_limit;
        let mode = self.settings.mode;

        let timeout = match mode {
            PromptMode::Detailed => adaptive_timeout(self.settings.timeout, analysis),
            PromptMode::Fast => self.settings.fast_timeout,
        };

        let request = prompt_builder::build(analysis, mode, &summary, recent, limit);
        let (raw, request) = match self.call(&request, timeout) {
            Ok(raw) => (raw, request),
            Err(e) if mode == PromptMode::Detailed && e.is_retryable() => {
                log::warn!("Detailed generation failed ({e}); retrying in fast mode");
                let fast = prompt_builder::build(analysis, PromptMode::Fast, &summary, recent, limit);
                let raw = self
                    .call(&fast, self.settings.fast_timeout)
                    .context("backend unreachable after fast-mode retry")?;
                (raw, fast)
            }
            Err(e) => return Err(anyhow!(e).context("backend unreachable")),
        };

        Ok(self
            .extractor
            .extract(&raw, request.analysis, request.character_limit))
    }

    fn call(&self, request: &PromptRequest<'_>, timeout: Duration) -> Result<String, BackendError> {
        log::debug!(
            "Calling {} backend (model {}) with a {} prompt, {}s timeout, {} recent subject(s)",
            self.backend.kind(),
            self.backend.model(),
            request.mode.as_str(),
            timeout.as_secs(),
            request.recent_subjects.len()
        );
        log::trace!("Changes:\n{}", request.file_status_summary);
        log::trace!("Prompt:\n{}", truncate_for_log(&request.prompt, 4_000));

        let reply = self.backend.call(&request.prompt, timeout)?;
        log::debug!(
            "Raw {} reply: {}",
            reply.backend_kind,
            truncate_for_log(&reply.raw_text, 500)
        );
        Ok(reply.raw_text)
    }

    /// Per-file generation with up to `jobs` calls in flight. Results land
    /// in discovery order; failed files are dropped with a warning.
    fn generate_all(&self, analysis: &ChangeAnalysis, recent: &[String]) -> Vec<PlanEntry> {
        let count = analysis.records.len();
        let jobs = self.settings.jobs.clamp(1, count.max(1));
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<PlanEntry>>> = Mutex::new((0..count).map(|_| None).collect());
        let bar = self.ui.progress(count as u64, "Generating messages");

        thread::scope(|s| {
            for _ in 0..jobs {
                s.spawn(|| {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(single) = analysis.for_record(index) else {
                            break;
                        };
                        let record = &analysis.records[index];

                        match self.generate(&single, recent) {
                            Ok(message) => {
                                let entry = PlanEntry {
                                    path: record.path.clone(),
                                    orig_path: record.orig_path.clone(),
                                    message,
                                    commit_id: None,
                                };
                                slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(entry);
                            }
                            Err(e) => log::warn!("Skipping {}: {e:#}", record.path),
                        }
                        bar.inc(1);
                    }
                });
            }
        });
        bar.finish_and_clear();

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Ask for a replacement message. Returns whether the entry changed.
    fn edit_entry(&self, plan: &mut CommitPlan, index: usize) -> Result<bool> {
        let Some(entry) = plan.entries.get_mut(index) else {
            self.ui.warn(&format!("There is no entry {}", index + 1));
            return Ok(false);
        };

        let label = format!("#{} {}", index + 1, entry.path);
        let Some(text) = self.ui.edit_message(&label, &entry.message.text)? else {
            return Ok(false);
        };

        match self.extractor.validate_edit(&text) {
            Some(message) => {
                entry.message = message;
                Ok(true)
            }
            None => {
                self.ui.warn(&format!(
                    "{text:?} is not a conventional commit message; keeping the previous one"
                ));
                Ok(false)
            }
        }
    }

    fn commit_entry(&self, plan: &mut CommitPlan, index: usize) -> Result<()> {
        let entry = &mut plan.entries[index];

        let mut staging = StagingArea::new(self.vcs);
        staging.stage(&entry.paths())?;
        let id = self
            .vcs
            .commit(&entry.message.text)
            .with_context(|| format!("failed to commit {}", entry.path))?;
        staging.release();

        self.ui.success(&format!("[{}] {}", short_id(&id), entry.message.text));
        entry.commit_id = Some(id);
        Ok(())
    }

    /// Reword a created commit: soft-reset to its parent, then recreate it
    /// and every later commit in the original order.
    fn reword(&self, plan: &mut CommitPlan, index: usize) -> Result<()> {
        let parent = match index {
            0 => plan.base.clone(),
            _ => plan
                .entries
                .get(index - 1)
                .and_then(|e| e.commit_id.clone()),
        };
        let Some(parent) = parent else {
            self.ui.warn("The first commit of a repository without history cannot be reworded");
            return Ok(());
        };

        if !self.edit_entry(plan, index)? {
            return Ok(());
        }

        log::info!("Replaying {} commit(s) onto {parent}", plan.entries.len() - index);
        self.vcs
            .soft_reset(&parent)
            .with_context(|| format!("failed to reset to {parent}"))?;
        self.vcs
            .unstage_all()
            .context("failed to clear the staging area")?;
        for later in index..plan.entries.len() {
            self.commit_entry(plan, later)?;
        }

        self.ui.show_plan(plan);
        Ok(())
    }

    /// Push failures are reported; the commits already exist.
    fn push_if_enabled(&self) {
        if !self.settings.auto_push {
            return;
        }
        match self.push() {
            Ok(branch) => self.ui.success(&format!("Pushed {branch}")),
            Err(e) => self.ui.warn(&format!("Push failed: {e:#}")),
        }
    }

    fn push(&self) -> Result<String> {
        let branch = self.vcs.current_branch().context("failed to read the current branch")?;
        let set_upstream = self.vcs.upstream()?.is_none();
        self.vcs.push(&branch, set_upstream)?;
        Ok(branch)
    }
}
