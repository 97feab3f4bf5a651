use std::sync::LazyLock;

use regex::Regex;

use super::length::truncate_to_limit;
use super::{CommitType, Stage, StageContext, TYPE_ALTERNATION, is_conventional};

static THINK_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<think(?:ing)?>").unwrap());
static THINK_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</think(?:ing)?>").unwrap());
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>\n]*>").unwrap());

/// `thinking...`, `thinking:` and `thinking about it... ` lines.
static THINKING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*thinking(?:[ \t]*(?:\.\.\.|…|:)|\b[^\n]*?(?:\.\.\.|…))[^\n]*$").unwrap()
});

static SCOPED_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^(?:{TYPE_ALTERNATION})\(")).unwrap());
static BARE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^(?:{TYPE_ALTERNATION})!?:")).unwrap());
static HEADER_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b(?:{TYPE_ALTERNATION})(?:\(|!?:)")).unwrap());
static TYPE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b(?:{TYPE_ALTERNATION})\b")).unwrap());
static TYPE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^(?:{TYPE_ALTERNATION})\b")).unwrap());
static HEADER_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^((?:{TYPE_ALTERNATION})(?:\([^()]*\))?!?)[ \t]*:[ \t]*")).unwrap()
});

const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Types that a performance keyword may rewrite to `perf`.
const PERF_REWRITABLE: &[CommitType] = &[
    CommitType::Feat,
    CommitType::Fix,
    CommitType::Refactor,
    CommitType::Chore,
    CommitType::Style,
    CommitType::Build,
];

/// Drop reasoning blocks and "thinking" chatter.
pub struct ThinkStrip;

impl Stage for ThinkStrip {
    fn name(&self) -> &'static str {
        "think-strip"
    }

    fn attempt(&self, candidate: String, _ctx: &StageContext<'_>) -> Option<String> {
        let Some(open) = THINK_OPEN.find(&candidate) else {
            return Some(THINKING_LINE.replace_all(&candidate, "").into_owned());
        };

        let after_open = &candidate[open.end()..];
        let rest = match THINK_CLOSE.find(after_open) {
            Some(close) => &after_open[close.end()..],
            None => after_open,
        };
        Some(MARKUP.replace_all(rest, "").into_owned())
    }
}

/// Pick the line that looks most like a commit message.
pub struct PatternMatch;

impl Stage for PatternMatch {
    fn name(&self) -> &'static str {
        "pattern-match"
    }

    fn attempt(&self, candidate: String, _ctx: &StageContext<'_>) -> Option<String> {
        let lines: Vec<&str> = candidate
            .lines()
            .map(|l| l.trim_start_matches(|c: char| c.is_whitespace() || QUOTES.contains(&c)))
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();

        let found = lines
            .iter()
            .find(|l| SCOPED_OPENER.is_match(l))
            .or_else(|| lines.iter().find(|l| BARE_OPENER.is_match(l)))
            .map(|l| l.to_string())
            .or_else(|| lines.iter().rev().find_map(|l| from_type_token(l)))?;

        Some(lowercase_type(found))
    }
}

/// Slice a line from its type token on, preferring a header-shaped token.
fn from_type_token(line: &str) -> Option<String> {
    let m = HEADER_ANYWHERE.find(line).or_else(|| TYPE_TOKEN.find(line))?;
    Some(line[m.start()..].to_string())
}

fn lowercase_type(line: String) -> String {
    match TYPE_PREFIX.find(&line) {
        Some(m) => format!("{}{}", m.as_str().to_ascii_lowercase(), &line[m.end()..]),
        None => line,
    }
}

/// Remove quoting and markdown residue around a single line.
pub struct Cleanup;

impl Stage for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn attempt(&self, candidate: String, _ctx: &StageContext<'_>) -> Option<String> {
        let unfenced = candidate.replace("```", "");
        let mut text = unfenced
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())?
            .to_string();

        while let Some(inner) = strip_wrapping_pair(&text) {
            text = inner.trim().to_string();
        }

        text = text.trim_start_matches(QUOTES).trim_start().to_string();

        while is_trailing_residue(&text) {
            text.pop();
            text = text.trim_end().to_string();
        }

        let text = HEADER_SPACING.replace(&text, "${1}: ").trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// A closing quote is residue when nothing opened it: it is detached from
/// the word before it, or its character appears nowhere else in the line.
fn is_trailing_residue(text: &str) -> bool {
    let mut rev = text.chars().rev();
    let Some(last) = rev.next() else {
        return false;
    };
    if !QUOTES.contains(&last) {
        return false;
    }
    let detached = rev
        .next()
        .is_none_or(|prev| prev.is_whitespace() || QUOTES.contains(&prev));
    detached || text.matches(last).count() == 1
}

fn strip_wrapping_pair(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    if text.chars().count() < 2 || !QUOTES.contains(&first) || !text.ends_with(first) {
        return None;
    }
    Some(&text[first.len_utf8()..text.len() - first.len_utf8()])
}

/// Rewrite the type to `perf` when the wording is about speed or concurrency.
pub struct TypeAutoCorrect;

impl Stage for TypeAutoCorrect {
    fn name(&self) -> &'static str {
        "type-autocorrect"
    }

    fn attempt(&self, candidate: String, ctx: &StageContext<'_>) -> Option<String> {
        let Some(prefix) = TYPE_PREFIX.find(&candidate) else {
            return Some(candidate);
        };
        let Some(ty) = CommitType::parse(prefix.as_str()) else {
            return Some(candidate);
        };

        let rest = &candidate[prefix.end()..];
        if !PERF_REWRITABLE.contains(&ty) || !ctx.perf_keywords.matches(rest) {
            return Some(candidate);
        }

        let rewritten = format!("{}{rest}", CommitType::Perf);
        log::debug!("Rewriting {ty} to perf: {rewritten:?}");
        Some(truncate_to_limit(&rewritten, ctx.limit))
    }
}

/// Last gate before emission; a miss routes to the fallback.
pub struct FinalValidation;

impl Stage for FinalValidation {
    fn name(&self) -> &'static str {
        "final-validation"
    }

    fn attempt(&self, candidate: String, _ctx: &StageContext<'_>) -> Option<String> {
        if is_conventional(&candidate) {
            Some(candidate)
        } else {
            log::warn!("Model reply is not a conventional commit: {candidate:?}");
            None
        }
    }
}
