use crate::collector::{ChangeAnalysis, ChangeKind, ChangeRecord};
use crate::signals::{Signal, is_dependency_manifest, is_docs_path};

use super::{CommitType, ExtractedMessage, MessageSource};

type Rule = (fn(&ChangeAnalysis) -> bool, CommitType, &'static str);

/// Checked in order; the first matching rule names the message.
const RULES: &[Rule] = &[
    (adds_definitions, CommitType::Feat, "add new functionality"),
    (removes_definitions, CommitType::Refactor, "remove unused code"),
    (touches_docs, CommitType::Docs, "update documentation"),
    (touches_manifests, CommitType::Chore, "update dependencies"),
];

const DEFAULT: (CommitType, &str) = (CommitType::Chore, "update project files");

/// Rule-derived message used when the model reply is unusable. Never fails.
pub fn fallback_message(analysis: &ChangeAnalysis) -> ExtractedMessage {
    let (commit_type, description) = RULES
        .iter()
        .find(|(applies, _, _)| applies(analysis))
        .map(|(_, ty, description)| (*ty, *description))
        .unwrap_or(DEFAULT);

    let text = format!("{commit_type}: {description}");
    log::info!("Using fallback message {text:?}");

    ExtractedMessage {
        length: text.chars().count(),
        text,
        commit_type,
        scope: None,
        source: MessageSource::Fallback,
    }
}

fn code_records(analysis: &ChangeAnalysis) -> impl Iterator<Item = &ChangeRecord> {
    analysis.records.iter().filter(|r| !is_docs_path(&r.path))
}

fn adds_definitions(analysis: &ChangeAnalysis) -> bool {
    code_records(analysis).any(|r| {
        r.signals.contains(&Signal::FunctionDef) || r.signals.contains(&Signal::TypeDef)
    })
}

fn removes_definitions(analysis: &ChangeAnalysis) -> bool {
    code_records(analysis).any(|r| {
        r.kind == ChangeKind::Deleted
            || r.signals.contains(&Signal::FunctionRemoved)
            || r.signals.contains(&Signal::TypeRemoved)
    })
}

fn touches_docs(analysis: &ChangeAnalysis) -> bool {
    analysis.records.iter().any(|r| is_docs_path(&r.path))
}

fn touches_manifests(analysis: &ChangeAnalysis) -> bool {
    analysis.records.iter().any(|r| is_dependency_manifest(&r.path))
}
