mod cli_args;
mod collector;
mod config;
mod error;
mod extract;
mod git;
mod llm;
mod logging;
mod orchestrator;
mod signals;
#[cfg(test)]
mod testing;
mod ui;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli_args::{Cli, Command};
use crate::collector::ChangeAnalysis;
use crate::config::Config;
use crate::error::RepositoryError;
use crate::extract::Extractor;
use crate::git::{GitCli, Vcs};
use crate::orchestrator::Orchestrator;
use crate::signals::PerfKeywords;
use crate::ui::Console;

/// Tiny prompt for `smart-commit test`.
const PROBE_PROMPT: &str = "Write one conventional commit message for adding a README file \
with installation steps. Respond with the commit message only.";

/// `smart-commit test`: detect, call once, show what extraction makes of it.
fn run_backend_test(cfg: &Config, extractor: &Extractor) -> Result<()> {
    let backend = llm::select_backend(cfg.backend, &cfg.api_url, &cfg.model, cfg.probe_timeout)?;
    println!("Backend: {} at {}", backend.kind(), cfg.api_url);

    let reply = backend
        .call(PROBE_PROMPT, cfg.fast_timeout)
        .context("backend test failed")?;
    println!("Model: {}", backend.model());
    println!("Raw reply: {}", reply.raw_text.trim());

    let message = extractor.extract(&reply.raw_text, &ChangeAnalysis::default(), cfg.character_limit);
    if message.is_fallback() {
        println!("Extracted: {} (fallback)", message.text);
    } else {
        println!("Extracted: {}", message.text);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose, cli.debug);

    let cfg = Config::from_sources(&cli)?;
    log::debug!("Resolved config: {cfg:?}");

    let extractor = Extractor::new(PerfKeywords::new(&cfg.perf_keywords)?);

    match &cli.command {
        Some(Command::Config) => {
            print!("{}", cfg.to_toml()?);
            return Ok(());
        }
        Some(Command::Test) => return run_backend_test(&cfg, &extractor),
        None => {}
    }

    let repo_dir: PathBuf = match &cli.repo {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to read the current directory")?,
    };
    let vcs = GitCli::new(&repo_dir);
    if !vcs.is_repository() {
        return Err(RepositoryError::NotARepository(repo_dir).into());
    }

    let backend = llm::select_backend(cfg.backend, &cfg.api_url, &cfg.model, cfg.probe_timeout)?;
    let console = Console::new(cli.yes);
    let orchestrator = Orchestrator::new(&vcs, backend.as_ref(), &console, extractor, cfg.run_settings());

    if cli.atomic {
        orchestrator.run_atomic(cli.dry_run)?;
    } else {
        orchestrator.run(cli.dry_run)?;
    }

    Ok(())
}
