use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext};

const ELLIPSIS: &str = "...";

/// Below this many characters of description budget, cut blindly.
const MIN_DESCRIPTION_BUDGET: usize = 10;

/// Longhand to shorthand pairs, applied once and in this order.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("in order to", "to"),
    ("implementation", "impl"),
    ("configuration", "config"),
    ("documentation", "docs"),
    ("repository", "repo"),
    ("dependencies", "deps"),
    ("dependency", "dep"),
    ("directory", "dir"),
    ("authentication", "auth"),
    ("information", "info"),
    ("application", "app"),
    ("environment", "env"),
    ("performance", "perf"),
    ("functionality", "support"),
    ("with the", "with"),
    ("for the", "for"),
];

static SUBSTITUTION_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SUBSTITUTIONS
        .iter()
        .map(|(long, short)| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(long));
            (Regex::new(&pattern).unwrap(), *short)
        })
        .collect()
});

/// Bring the candidate within the character limit.
pub struct LengthEnforcement;

impl Stage for LengthEnforcement {
    fn name(&self) -> &'static str {
        "length-enforcement"
    }

    fn attempt(&self, candidate: String, ctx: &StageContext<'_>) -> Option<String> {
        if candidate.chars().count() <= ctx.limit {
            return Some(candidate);
        }

        let shortened = shorten(&candidate);
        if shortened.chars().count() <= ctx.limit {
            return Some(shortened);
        }

        Some(truncate_to_limit(&shortened, ctx.limit))
    }
}

/// Apply the substitution table to the description only.
fn shorten(text: &str) -> String {
    let (head, description) = match text.split_once(": ") {
        Some((head, description)) => (Some(head), description),
        None => (None, text),
    };

    let mut description = description.to_string();
    for (re, short) in SUBSTITUTION_TABLE.iter() {
        description = re.replace_all(&description, *short).into_owned();
    }

    match head {
        Some(head) => format!("{head}: {description}"),
        None => description,
    }
}

/// Truncate to `limit` characters, keeping `type(scope):` intact and
/// cutting the description back to a whole word.
pub fn truncate_to_limit(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    if let Some((head, description)) = text.split_once(':') {
        let budget = limit.saturating_sub(head.chars().count() + 2);
        if budget > MIN_DESCRIPTION_BUDGET {
            let description = description.trim_start();
            let keep = budget - ELLIPSIS.len();
            let cut: String = description.chars().take(keep).collect();
            let at_boundary = description.chars().nth(keep).is_none_or(char::is_whitespace);

            let cut = match cut.rfind(char::is_whitespace) {
                Some(idx) if !at_boundary => &cut[..idx],
                _ => cut.as_str(),
            };
            return format!("{head}: {}{ELLIPSIS}", cut.trim_end());
        }
    }

    let cut: String = text.chars().take(limit.saturating_sub(ELLIPSIS.len())).collect();
    format!("{}{ELLIPSIS}", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutions_touch_only_the_description() {
        assert_eq!(
            shorten("docs(documentation): Update Documentation for the Repository"),
            "docs(documentation): Update docs for repo"
        );
        assert_eq!(
            shorten("feat: add dependency and dependencies in order to build"),
            "feat: add dep and deps to build"
        );
    }

    #[test]
    fn substitutions_respect_word_boundaries() {
        assert_eq!(shorten("fix: reimplementation notes"), "fix: reimplementation notes");
    }

    #[test]
    fn description_is_cut_at_a_word() {
        let text = "feat(api): alpha beta gamma delta epsilon zeta eta theta iota kappa lambda";
        let out = truncate_to_limit(text, 50);
        assert_eq!(out, "feat(api): alpha beta gamma delta epsilon zeta...");
        assert!(out.chars().count() <= 50);
    }

    #[test]
    fn cut_that_lands_on_a_space_keeps_the_last_word() {
        // The budget keeps exactly "alpha beta" and the next char is a space.
        let text = "fix: alpha beta gamma delta epsilon zeta eta";
        let limit = "fix: ".len() + 10 + ELLIPSIS.len();
        assert_eq!(truncate_to_limit(text, limit), "fix: alpha beta...");
    }

    #[test]
    fn tiny_budget_or_no_colon_cuts_blindly() {
        let out = truncate_to_limit("feat(a-really-long-scope-name): something", 30);
        assert_eq!(out, "feat(a-really-long-scope-na...");
        assert_eq!(out.chars().count(), 30);

        let out = truncate_to_limit("no colon anywhere in this long line", 20);
        assert_eq!(out, "no colon anywhere...");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_to_limit("fix: x", 72), "fix: x");
    }
}
