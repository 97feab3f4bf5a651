//! Turn free-form model output into one conventional-commit line.
//!
//! Extraction is an ordered list of [`Stage`]s run by a fixed driver loop.
//! Each stage either hands a candidate to the next one or gives up, in
//! which case the deterministic fallback in [`fallback`] produces the
//! message. The pipeline never fails.

mod fallback;
mod length;
mod stages;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::collector::ChangeAnalysis;
use crate::signals::PerfKeywords;

pub use self::fallback::fallback_message;

/// Alternation of every accepted type token, for building patterns.
pub(crate) const TYPE_ALTERNATION: &str = "feat|fix|docs|style|refactor|test|chore|build|ci|perf|revert";

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^({TYPE_ALTERNATION})(?:\(([^()\s][^()]*)\))?!?: \S"
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Chore,
    Build,
    Ci,
    Perf,
    Revert,
}

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Chore => "chore",
            CommitType::Build => "build",
            CommitType::Ci => "ci",
            CommitType::Perf => "perf",
            CommitType::Revert => "revert",
        }
    }

    /// Case-insensitive lookup of a bare type token.
    pub fn parse(token: &str) -> Option<Self> {
        let ty = match token.to_ascii_lowercase().as_str() {
            "feat" => CommitType::Feat,
            "fix" => CommitType::Fix,
            "docs" => CommitType::Docs,
            "style" => CommitType::Style,
            "refactor" => CommitType::Refactor,
            "test" => CommitType::Test,
            "chore" => CommitType::Chore,
            "build" => CommitType::Build,
            "ci" => CommitType::Ci,
            "perf" => CommitType::Perf,
            "revert" => CommitType::Revert,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a final message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Model,
    Fallback,
    Edited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub text: String,
    pub commit_type: CommitType,
    pub scope: Option<String>,
    /// Length in characters.
    pub length: usize,
    pub source: MessageSource,
}

impl ExtractedMessage {
    /// Parse a line that follows `type[(scope)][!]: description`.
    pub fn parse(text: &str, source: MessageSource) -> Option<Self> {
        let caps = HEADER.captures(text)?;
        let commit_type = CommitType::parse(caps.get(1)?.as_str())?;
        let scope = caps.get(2).map(|m| m.as_str().to_string());
        Some(ExtractedMessage {
            text: text.to_string(),
            commit_type,
            scope,
            length: text.chars().count(),
            source,
        })
    }

    pub fn is_fallback(&self) -> bool {
        self.source == MessageSource::Fallback
    }
}

pub fn is_conventional(text: &str) -> bool {
    HEADER.is_match(text)
}

/// Inputs every stage may consult.
pub struct StageContext<'a> {
    pub limit: usize,
    pub perf_keywords: &'a PerfKeywords,
}

/// One step of the extraction pipeline: refine the candidate or give up.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, candidate: String, ctx: &StageContext<'_>) -> Option<String>;
}

pub struct Extractor {
    stages: Vec<Box<dyn Stage>>,
    perf_keywords: PerfKeywords,
}

impl Extractor {
    pub fn new(perf_keywords: PerfKeywords) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(stages::ThinkStrip),
            Box::new(stages::PatternMatch),
            Box::new(stages::Cleanup),
            Box::new(length::LengthEnforcement),
            Box::new(stages::TypeAutoCorrect),
            Box::new(stages::FinalValidation),
        ];
        Self {
            stages,
            perf_keywords,
        }
    }

    pub fn extract(&self, raw: &str, analysis: &ChangeAnalysis, limit: usize) -> ExtractedMessage {
        let ctx = StageContext {
            limit,
            perf_keywords: &self.perf_keywords,
        };

        let mut candidate = raw.to_string();
        for stage in &self.stages {
            match stage.attempt(candidate, &ctx) {
                Some(next) => {
                    log::debug!("{}: {next:?}", stage.name());
                    candidate = next;
                }
                None => {
                    log::debug!("{}: no candidate, using fallback", stage.name());
                    return fallback_message(analysis);
                }
            }
        }

        ExtractedMessage::parse(&candidate, MessageSource::Model)
            .unwrap_or_else(|| fallback_message(analysis))
    }

    /// Accept a user-typed message when it is a conventional commit line.
    pub fn validate_edit(&self, text: &str) -> Option<ExtractedMessage> {
        ExtractedMessage::parse(text.trim(), MessageSource::Edited)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(PerfKeywords::default())
    }
}
