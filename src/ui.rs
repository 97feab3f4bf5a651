//! Terminal interaction: status lines, confirmations, plan preview and
//! progress bars.

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};

use crate::extract::ExtractedMessage;
use crate::orchestrator::CommitPlan;

/// Answer to the atomic-mode plan review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Cancel,
    /// Zero-based index of the entry to rewrite.
    Edit(usize),
}

/// Everything the orchestrator needs from the person at the keyboard.
pub trait Ui: Send + Sync {
    fn status(&self, text: &str);
    fn warn(&self, text: &str);
    fn success(&self, text: &str);

    fn show_message(&self, message: &ExtractedMessage);
    fn show_plan(&self, plan: &CommitPlan);

    /// Yes/no question; anything but an explicit yes is a no.
    fn confirm(&self, question: &str) -> Result<bool>;
    fn review_plan(&self, plan: &CommitPlan) -> Result<ReviewAction>;
    /// A replacement message, or `None` to keep `current`.
    fn edit_message(&self, label: &str, current: &str) -> Result<Option<String>>;
    /// Pick a created commit to reword, or `None` when done.
    fn select_amend(&self, plan: &CommitPlan) -> Result<Option<usize>>;

    fn progress(&self, len: u64, label: &str) -> ProgressBar;
    fn spinner(&self, label: &str) -> ProgressBar;
}

/// Interactive terminal front end.
pub struct Console {
    assume_yes: bool,
    interactive: bool,
}

impl Console {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            interactive: io::stdin().is_terminal(),
        }
    }

    /// Single keypress in raw mode, or the first character of a line when
    /// stdin is not a terminal.
    fn read_key(&self, prompt: &str) -> Result<char> {
        if !self.interactive {
            // Closed stdin answers no.
            let Some(line) = prompt_input(prompt)? else {
                return Ok('n');
            };
            return Ok(line.chars().next().map_or('\n', |c| c.to_ascii_lowercase()));
        }

        print!("{prompt}");
        io::stdout().flush()?;

        let key = {
            let _raw = RawMode::enable()?;
            loop {
                let Event::Key(key) = event::read().context("failed to read key")? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break 'n',
                    KeyCode::Char(c) => break c.to_ascii_lowercase(),
                    KeyCode::Enter => break '\n',
                    KeyCode::Esc => break 'n',
                    _ => {}
                }
            }
        };

        println!("{}", if key == '\n' { ' ' } else { key });
        Ok(key)
    }
}

/// Disables raw mode when dropped, including on early return.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enter raw terminal mode")?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("failed to restore terminal mode: {e}");
        }
    }
}

/// Prompt and read one trimmed line from stdin; `None` at end of input.
fn prompt_input(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    read_answer(&mut io::stdin().lock())
}

fn read_answer(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

/// Review answer for a line read from stdin. End of input cancels.
fn review_answer(answer: Option<&str>, len: usize) -> Option<ReviewAction> {
    match answer {
        Some(answer) => parse_review(answer, len),
        None => Some(ReviewAction::Cancel),
    }
}

/// Parse a 1-based entry number typed by the user.
pub fn parse_entry_number(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Parse the review prompt answer: `a`/Enter, `c`/`q`, `e N` or a bare `N`.
pub fn parse_review(input: &str, len: usize) -> Option<ReviewAction> {
    let input = input.trim().to_ascii_lowercase();
    match input.as_str() {
        "" | "a" | "approve" | "y" | "yes" => Some(ReviewAction::Approve),
        "c" | "cancel" | "q" | "n" | "no" => Some(ReviewAction::Cancel),
        other => {
            let number = other
                .strip_prefix("edit")
                .or_else(|| other.strip_prefix('e'))
                .unwrap_or(other);
            parse_entry_number(number, len).map(ReviewAction::Edit)
        }
    }
}

impl Ui for Console {
    fn status(&self, text: &str) {
        println!("{text}");
    }

    fn warn(&self, text: &str) {
        eprintln!("{} {text}", "warning:".yellow().bold());
    }

    fn success(&self, text: &str) {
        println!("{} {text}", "✓".green().bold());
    }

    fn show_message(&self, message: &ExtractedMessage) {
        println!();
        println!("----- Commit Message Preview -----");
        println!("{}", message.text.bold());
        println!("----------------------------------");
        println!("{}", format!("{} characters", message.length).bright_black());
        if message.is_fallback() {
            println!("{}", "(generic fallback: the model reply was unusable)".bright_black());
        }
    }

    fn show_plan(&self, plan: &CommitPlan) {
        println!();
        println!(
            "{}",
            format!("{:>3}  {:<10} {:<12} {}", "#", "type", "scope", "message").bold()
        );
        for (i, entry) in plan.entries.iter().enumerate() {
            let scope = entry.message.scope.as_deref().unwrap_or("-");
            let mut line = format!(
                "{:>3}  {:<10} {:<12} {}",
                i + 1,
                entry.message.commit_type.as_str(),
                scope,
                entry.message.text
            );
            if let Some(id) = &entry.commit_id {
                line.push_str(&format!("  [{}]", short_id(id)));
            }
            println!("{line}");
            println!("     {}", entry.path.bright_black());
        }
        println!();
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let key = self.read_key(&format!("{question} [y/N] "))?;
        Ok(key == 'y')
    }

    fn review_plan(&self, plan: &CommitPlan) -> Result<ReviewAction> {
        if self.assume_yes {
            return Ok(ReviewAction::Approve);
        }
        loop {
            let answer = prompt_input("[a]pprove all, [e N] edit entry N, [c]ancel: ")?;
            match review_answer(answer.as_deref(), plan.entries.len()) {
                Some(action) => return Ok(action),
                None => println!("Invalid choice. Enter a, c, or e followed by an entry number."),
            }
        }
    }

    fn edit_message(&self, label: &str, current: &str) -> Result<Option<String>> {
        println!("Current message for {label}: {current}");
        let answer = prompt_input("New message (empty keeps the current one): ")?;
        Ok(answer.filter(|a| !a.is_empty()))
    }

    fn select_amend(&self, plan: &CommitPlan) -> Result<Option<usize>> {
        if self.assume_yes || !self.interactive {
            return Ok(None);
        }
        loop {
            let answer = prompt_input("Reword a created commit? Enter its number, or press Enter to finish: ")?;
            let Some(answer) = answer.filter(|a| !a.is_empty()) else {
                return Ok(None);
            };
            match parse_entry_number(&answer, plan.entries.len()) {
                Some(index) => return Ok(Some(index)),
                None => println!("Invalid choice. Enter a number between 1 and {}.", plan.entries.len()),
            }
        }
    }

    fn progress(&self, len: u64, label: &str) -> ProgressBar {
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(label.to_string());
        bar
    }

    fn spinner(&self, label: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

/// Abbreviated commit id for display.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}
