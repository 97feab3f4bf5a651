use crate::collector::{ChangeAnalysis, bound_lines};
use crate::signals::is_definition_line;

use super::prompts;

/// Diffs up to this size are sent whole in fast mode.
pub const FAST_FULL_BYTES: usize = 2_000;
/// Diffs up to this size keep only their head in fast mode.
pub const FAST_HEAD_BYTES: usize = 8_000;
const FAST_HEAD_LINES: usize = 50;
const SMART_HEAD_LINES: usize = 80;
const SMART_DEFINITION_CAP: usize = 20;

pub const FAST_DIFF_LINES: usize = 110;
pub const DETAILED_DIFF_LINES: usize = 200;
const FAST_EXCERPT_LINES: usize = 30;
const DETAILED_EXCERPT_LINES: usize = 120;
const FAST_SUMMARY_FILES: usize = 10;
pub const MAX_RECENT_SUBJECTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Fast,
    Detailed,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Fast => "fast",
            PromptMode::Detailed => "detailed",
        }
    }
}

/// A rendered prompt plus everything it was rendered from.
#[derive(Debug)]
pub struct PromptRequest<'a> {
    pub mode: PromptMode,
    pub analysis: &'a ChangeAnalysis,
    pub file_status_summary: String,
    pub recent_subjects: Vec<String>,
    /// The limit written into `prompt`; extraction must enforce the same value.
    pub character_limit: usize,
    pub prompt: String,
}

pub fn build<'a>(
    analysis: &'a ChangeAnalysis,
    mode: PromptMode,
    file_status_summary: &str,
    recent_subjects: &[String],
    character_limit: usize,
) -> PromptRequest<'a> {
    let recent_subjects: Vec<String> = recent_subjects
        .iter()
        .take(MAX_RECENT_SUBJECTS)
        .cloned()
        .collect();

    let prompt = match mode {
        PromptMode::Fast => render_fast(analysis, file_status_summary, character_limit),
        PromptMode::Detailed => render_detailed(
            analysis,
            file_status_summary,
            &recent_subjects,
            character_limit,
        ),
    };

    log::debug!(
        "Built {} prompt: {} chars, limit {character_limit}",
        mode.as_str(),
        prompt.chars().count()
    );

    PromptRequest {
        mode,
        analysis,
        file_status_summary: file_status_summary.to_string(),
        recent_subjects,
        character_limit,
        prompt,
    }
}

fn render_fast(analysis: &ChangeAnalysis, summary: &str, limit: usize) -> String {
    let mut out = String::from("Analyze this git change and write ONE conventional commit message.\n\n");

    match single_record_path(analysis) {
        Some(path) => out.push_str(&format!("## File: {path}\n\n")),
        None => {
            out.push_str("## Changed files:\n");
            out.push_str(&cap_summary(summary, FAST_SUMMARY_FILES));
            out.push('\n');
        }
    }

    let excerpt = bound_lines(&analysis.diff_excerpt, FAST_EXCERPT_LINES);
    if !excerpt.trim().is_empty() {
        out.push_str(&format!("## Key lines:\n{excerpt}\n\n"));
    }

    let diff = fast_diff(&analysis.combined_diff());
    out.push_str(&format!("## Diff:\n```diff\n{diff}\n```\n\n"));

    if let Some(hint) = scope_hint(analysis) {
        out.push_str(&hint);
        out.push_str("\n\n");
    }

    out.push_str(&prompts::render(prompts::FAST_INSTRUCTIONS, limit));
    out
}

fn render_detailed(
    analysis: &ChangeAnalysis,
    summary: &str,
    recent: &[String],
    limit: usize,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    match single_record_path(analysis) {
        Some(path) => sections.push(format!(
            "## File: {path}\n{}",
            summary.trim_end()
        )),
        None => sections.push(format!(
            "## Git Changes ({} files, +{} -{} lines):\n{}",
            analysis.records.len(),
            analysis.total_additions,
            analysis.total_deletions,
            summary.trim_end()
        )),
    }

    let excerpt = bound_lines(&analysis.diff_excerpt, DETAILED_EXCERPT_LINES);
    if !excerpt.trim().is_empty() {
        sections.push(format!("## Key structural changes:\n{excerpt}"));
    }

    let diff = bound_lines(&analysis.combined_diff(), DETAILED_DIFF_LINES);
    let diff = if diff.trim().is_empty() {
        "No diff content available".to_string()
    } else {
        diff
    };
    sections.push(format!("## Diff:\n```diff\n{}\n```", diff.trim_end()));

    for record in &analysis.records {
        if let Some(excerpt) = &record.content_excerpt {
            if record.is_dir {
                sections.push(format!("## {}:\n{excerpt}", record.path));
            }
        }
    }

    if !recent.is_empty() {
        let commits = recent
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("## Recent Commits (for style context):\n{commits}"));
    }

    if let Some(hint) = scope_hint(analysis) {
        sections.push(format!("## Scope for this change:\n{hint}"));
    }

    sections.push(prompts::render(prompts::DETAILED_INSTRUCTIONS, limit));
    sections.join("\n\n")
}

/// Three-tier progressive truncation used by fast mode.
pub fn fast_diff(diff: &str) -> String {
    let text = if diff.len() <= FAST_FULL_BYTES {
        diff.to_string()
    } else if diff.len() <= FAST_HEAD_BYTES {
        bound_lines(diff, FAST_HEAD_LINES)
    } else {
        smart_truncate(diff)
    };
    bound_lines(text.trim_end(), FAST_DIFF_LINES)
}

/// Head of the diff plus the definition lines found after it.
fn smart_truncate(diff: &str) -> String {
    let lines: Vec<&str> = diff.lines().collect();
    if lines.len() <= SMART_HEAD_LINES {
        return diff.to_string();
    }

    let mut out: Vec<&str> = lines[..SMART_HEAD_LINES].to_vec();
    let definitions: Vec<&str> = lines[SMART_HEAD_LINES..]
        .iter()
        .copied()
        .filter(|l| is_definition_line(l))
        .take(SMART_DEFINITION_CAP)
        .collect();

    let marker = format!(
        "... [{} lines omitted, {} definition lines kept]",
        lines.len() - SMART_HEAD_LINES,
        definitions.len()
    );
    out.push(&marker);
    out.extend(definitions);
    out.join("\n")
}

fn single_record_path(analysis: &ChangeAnalysis) -> Option<&str> {
    match analysis.records.as_slice() {
        [only] => Some(only.path.as_str()),
        _ => None,
    }
}

fn scope_hint(analysis: &ChangeAnalysis) -> Option<String> {
    let [only] = analysis.records.as_slice() else {
        return None;
    };
    Some(match only.scope() {
        Some(scope) => format!("Use scope '{scope}' if appropriate."),
        None => format!("{} is a root-level file: use no scope.", only.path),
    })
}

fn cap_summary(summary: &str, max_files: usize) -> String {
    let lines: Vec<&str> = summary.lines().collect();
    let mut out: Vec<String> = lines
        .iter()
        .take(max_files)
        .map(|l| format!("- {l}"))
        .collect();
    if lines.len() > max_files {
        out.push(format!("... and {} more files", lines.len() - max_files));
    }
    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}
