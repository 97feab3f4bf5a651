//! Pattern tables behind every content heuristic in the pipeline.
//!
//! The collector tags files with [`Signal`]s, the prompt builder uses the
//! definition patterns for smart truncation, and the extractor uses the
//! performance keywords and path classes for type correction and fallback
//! selection. Everything here is data; extending a language means adding a
//! row, not a branch.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Structural and content signals detected in a file or diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    FunctionDef,
    TypeDef,
    Import,
    CliEntry,
    ConfigAssignment,
    Performance,
    DependencyAdd,
    FunctionRemoved,
    TypeRemoved,
}

impl Signal {
    pub fn hint(&self) -> &'static str {
        match self {
            Signal::FunctionDef => "defines functions",
            Signal::TypeDef => "defines classes/types",
            Signal::Import => "imports modules",
            Signal::CliEntry => "has a CLI entry point",
            Signal::ConfigAssignment => "assigns configuration keys",
            Signal::Performance => "touches performance/concurrency code",
            Signal::DependencyAdd => "adds dependencies",
            Signal::FunctionRemoved => "removes functions",
            Signal::TypeRemoved => "removes classes/types",
        }
    }
}

/// Which scan a table row belongs to. Extended rows only run on diffs of
/// modified files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Structural,
    Extended,
}

static SIGNAL_TABLE: LazyLock<Vec<(Regex, Signal, Group)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(
                r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:def|fn|func|function)\s+[A-Za-z_$][\w$]*",
            )
            .unwrap(),
            Signal::FunctionDef,
            Group::Structural,
        ),
        (
            Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+\w+\s*=\s*(?:async\s*)?\([^)]*\)\s*=>")
                .unwrap(),
            Signal::FunctionDef,
            Group::Structural,
        ),
        (
            Regex::new(
                r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:abstract\s+)?(?:class|struct|enum|trait|interface|impl)\b\s*[<A-Za-z_]",
            )
            .unwrap(),
            Signal::TypeDef,
            Group::Structural,
        ),
        (
            Regex::new(
                r"^\s*(?:import\s+\S|from\s+\S+\s+import\s|use\s+[\w:{]|#include\s|extern\s+crate\s|using\s+[\w.]+;)|\brequire\s*\(",
            )
            .unwrap(),
            Signal::Import,
            Group::Structural,
        ),
        (
            Regex::new(
                r#"if\s+__name__\s*==\s*["']__main__["']|^\s*(?:pub\s+)?(?:async\s+)?fn\s+main\s*\(|\bargparse\b|\bclap::|#\[derive\([^)]*Parser|@click\.command|\btyper\.|^#!"#,
            )
            .unwrap(),
            Signal::CliEntry,
            Group::Structural,
        ),
        (
            Regex::new(r#"^\s*[A-Za-z_][\w.\-]*\s*[=:]\s*(?:"[^"]*"|'[^']*'|[\w.\-/]+)\s*,?\s*$"#).unwrap(),
            Signal::ConfigAssignment,
            Group::Structural,
        ),
        (
            Regex::new(
                r"(?i)\b(?:thread\w*|parallel\w*|concurren\w*|multiprocess\w*|asyncio|rayon|spawn_blocking|batch\w*|optimi[sz]\w*|lru_cache|memoi[sz]\w*|\w*pool(?:executor)?)\b",
            )
            .unwrap(),
            Signal::Performance,
            Group::Extended,
        ),
        (
            Regex::new(
                r#"^\s*(?:"[@\w./-]+"\s*:\s*"[\^~>=<*]?\d[^"]*"|[\w-]+\s*=\s*(?:"[\^~>=<*]?\d[^"]*"|\{\s*version)|[A-Za-z][\w.-]*\s*(?:==|>=|~=|<=)\s*\d|require\s+[\w./-]+\s+v\d)"#,
            )
            .unwrap(),
            Signal::DependencyAdd,
            Group::Extended,
        ),
    ]
});

/// Hunk headers that carry an enclosing scope (`@@ -1,2 +1,3 @@ fn foo()`).
static SCOPE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ [^@]+ @@\s*\S").unwrap());

/// Keyword fragments that mark a message as a performance change.
pub const DEFAULT_PERF_KEYWORDS: &[&str] = &[
    r"parallel\w*",
    r"concurren\w*",
    r"multi-?thread\w*",
    r"thread\s?pool\w*",
    r"thread(?:s|ed|ing)?",
    r"batch\w*",
    r"optimi[sz]\w*",
    r"speed\s?up\w*",
    r"faster",
    r"performance",
    r"throughput",
    r"latency",
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt", "adoc", "asciidoc"];

const DEPENDENCY_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "requirements.txt",
    "requirements-dev.txt",
    "pyproject.toml",
    "poetry.lock",
    "Pipfile",
    "Pipfile.lock",
    "setup.py",
    "setup.cfg",
    "go.mod",
    "go.sum",
    "Gemfile",
    "Gemfile.lock",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "composer.json",
    "mix.exs",
];

/// Signals found in plain file content (new files). Extended rows are skipped.
pub fn scan_content<'a>(lines: impl IntoIterator<Item = &'a str>) -> BTreeSet<Signal> {
    let mut found = BTreeSet::new();
    for line in lines {
        for (re, signal, group) in SIGNAL_TABLE.iter() {
            if *group == Group::Structural && re.is_match(line) {
                found.insert(*signal);
            }
        }
    }
    found
}

/// Signals found in a unified diff: every row runs on added lines, and
/// definition rows on removed lines produce the `*Removed` signals.
pub fn scan_diff(diff: &str) -> BTreeSet<Signal> {
    let mut found = BTreeSet::new();
    for line in diff.lines() {
        if let Some(added) = added_content(line) {
            for (re, signal, _) in SIGNAL_TABLE.iter() {
                if re.is_match(added) {
                    found.insert(*signal);
                }
            }
        } else if let Some(removed) = removed_content(line) {
            for (re, signal, _) in SIGNAL_TABLE.iter() {
                if !re.is_match(removed) {
                    continue;
                }
                match signal {
                    Signal::FunctionDef => {
                        found.insert(Signal::FunctionRemoved);
                    }
                    Signal::TypeDef => {
                        found.insert(Signal::TypeRemoved);
                    }
                    _ => {}
                }
            }
        }
    }
    found
}

/// A diff line worth keeping in the change excerpt: a changed line that
/// opens a definition or imports something, or a hunk header with scope.
pub fn is_interesting_diff_line(line: &str) -> bool {
    if SCOPE_MARKER.is_match(line) {
        return true;
    }
    let Some(content) = added_content(line).or_else(|| removed_content(line)) else {
        return false;
    };
    SIGNAL_TABLE.iter().any(|(re, signal, _)| {
        matches!(signal, Signal::FunctionDef | Signal::TypeDef | Signal::Import) && re.is_match(content)
    })
}

/// Definition lines (functions and types) used by smart truncation.
pub fn is_definition_line(line: &str) -> bool {
    let content = added_content(line)
        .or_else(|| removed_content(line))
        .unwrap_or(line);
    SIGNAL_TABLE.iter().any(|(re, signal, _)| {
        matches!(signal, Signal::FunctionDef | Signal::TypeDef) && re.is_match(content)
    })
}

/// Render a one-line hint, empty when nothing was recognised.
pub fn render_hint(signals: &BTreeSet<Signal>) -> String {
    signals
        .iter()
        .map(Signal::hint)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn is_dependency_manifest(path: &str) -> bool {
    let name = file_name(path);
    DEPENDENCY_MANIFESTS.contains(&name)
}

pub fn is_docs_path(path: &str) -> bool {
    if is_dependency_manifest(path) {
        return false;
    }
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension {
        Some(ext) => DOC_EXTENSIONS.contains(&ext.as_str()),
        None => path.starts_with("docs/"),
    }
}

/// Compiled performance keyword set used by type auto-correction.
#[derive(Debug, Clone)]
pub struct PerfKeywords {
    re: Regex,
}

impl PerfKeywords {
    /// Build the default table plus any literal extra words from config.
    pub fn new(extra: &[String]) -> Result<Self> {
        let mut parts: Vec<String> = DEFAULT_PERF_KEYWORDS.iter().map(|s| s.to_string()).collect();
        parts.extend(
            extra
                .iter()
                .map(|w| w.trim())
                .filter(|w| !w.is_empty())
                .map(regex::escape),
        );
        let pattern = format!(r"(?i)\b(?:{})\b", parts.join("|"));
        let re = Regex::new(&pattern).context("invalid performance keyword table")?;
        Ok(Self { re })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.re.is_match(text)
    }
}

impl Default for PerfKeywords {
    fn default() -> Self {
        let pattern = format!(r"(?i)\b(?:{})\b", DEFAULT_PERF_KEYWORDS.join("|"));
        Self {
            re: Regex::new(&pattern).unwrap(),
        }
    }
}

fn added_content(line: &str) -> Option<&str> {
    if line.starts_with("+++") {
        return None;
    }
    line.strip_prefix('+')
}

fn removed_content(line: &str) -> Option<&str> {
    if line.starts_with("---") {
        return None;
    }
    line.strip_prefix('-')
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_definitions_across_languages() {
        let found = scan_content([
            "def login(user):",
            "pub fn parse(input: &str) -> Result<()> {",
            "export async function load() {",
            "class Session:",
            "import os",
        ]);
        assert!(found.contains(&Signal::FunctionDef));
        assert!(found.contains(&Signal::TypeDef));
        assert!(found.contains(&Signal::Import));
    }

    #[test]
    fn unrecognised_content_yields_empty_hint() {
        let found = scan_content(["lorem ipsum dolor sit amet", "", "   "]);
        assert!(found.is_empty());
        assert_eq!(render_hint(&found), "");
    }

    #[test]
    fn content_scan_skips_extended_rows() {
        let found = scan_content(["from concurrent.futures import ThreadPoolExecutor"]);
        assert!(found.contains(&Signal::Import));
        assert!(!found.contains(&Signal::Performance));
    }

    #[test]
    fn diff_scan_sees_performance_and_removals() {
        let diff = "\
--- a/worker.py
+++ b/worker.py
@@ -1,4 +1,4 @@
-def run_serial(jobs):
+with ThreadPoolExecutor(max_workers=8) as pool:
";
        let found = scan_diff(diff);
        assert!(found.contains(&Signal::Performance));
        assert!(found.contains(&Signal::FunctionRemoved));
        assert!(!found.contains(&Signal::FunctionDef));
    }

    #[test]
    fn diff_scan_sees_dependency_additions() {
        let found = scan_diff("+serde = \"1.0\"\n+requests==2.31.0\n");
        assert!(found.contains(&Signal::DependencyAdd));
    }

    #[test]
    fn interesting_lines_ignore_file_headers() {
        assert!(!is_interesting_diff_line("+++ b/src/lib.rs"));
        assert!(is_interesting_diff_line("+fn new_thing() {}"));
        assert!(is_interesting_diff_line("@@ -10,6 +10,8 @@ impl Parser {"));
        assert!(!is_interesting_diff_line("+    let x = 1;"));
    }

    #[test]
    fn path_classes() {
        assert!(is_docs_path("README.md"));
        assert!(is_docs_path("docs/guide"));
        assert!(!is_docs_path("requirements.txt"));
        assert!(is_dependency_manifest("requirements.txt"));
        assert!(is_dependency_manifest("crates/core/Cargo.toml"));
        assert!(!is_dependency_manifest("src/main.rs"));
    }

    #[test]
    fn perf_keywords_are_extendable() {
        let kw = PerfKeywords::new(&["vectorize".to_string()]).unwrap();
        assert!(kw.matches("perf: Vectorize the inner loop"));
        assert!(kw.matches("feat: parallelize job execution"));
        assert!(!kw.matches("feat: add login validation function"));
    }
}
