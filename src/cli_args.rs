use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "smart-commit",
    version,
    about = "Conventional commit messages for your working tree, drafted by a local LLM"
)]
pub struct Cli {
    /// Print the generated message (or plan) without staging or committing
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// One commit per changed file, reviewed as a batch before committing
    #[arg(short, long)]
    pub atomic: bool,

    /// Detailed prompt with scope and type rules
    #[arg(long, global = true, conflicts_with = "fast")]
    pub full: bool,

    /// Short prompt and fixed timeout, for slow inference hardware
    #[arg(long, global = true)]
    pub fast: bool,

    /// Do not push after committing
    #[arg(long)]
    pub no_push: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Backend kind: auto, ollama, or openai (llama.cpp, LM Studio, vLLM)
    #[arg(long, env = "SMART_COMMIT_BACKEND", global = true)]
    pub backend: Option<String>,

    /// Model name; "auto" asks an OpenAI-compatible server for its first model
    #[arg(long, env = "SMART_COMMIT_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of the inference server
    #[arg(long, env = "SMART_COMMIT_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Maximum commit message length in characters (50-200)
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Base timeout in seconds for detailed generation
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Backend calls in flight during atomic generation (1-8)
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Configuration file (default: ~/.config/smart-commit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository directory (default: current directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Debug mode: log timeouts, stage outcomes and raw replies
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// `--fast` and `--full` as a tri-state.
    pub fn fast_mode(&self) -> Option<bool> {
        match (self.fast, self.full) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Subcommands, e.g. `smart-commit test`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect the backend, send a tiny prompt, show the raw and extracted reply
    Test,

    /// Print the resolved configuration as TOML
    Config,
}
