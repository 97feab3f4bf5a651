use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli_args::Cli;
use crate::llm::BackendKind;
use crate::llm::detect::DEFAULT_PROBE_TIMEOUT;
use crate::llm::prompt_builder::PromptMode;
use crate::orchestrator::RunSettings;

const DEFAULT_API_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:8b";
const FAST_LIMIT: usize = 72;
const DETAILED_LIMIT: usize = 100;
const MIN_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;
const MAX_JOBS: usize = 8;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 3_600;
const DEFAULT_FAST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_DIFF_LINES: usize = 500;

/// Final resolved configuration for smart-commit.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub model: String,
    /// `None` means detect at startup.
    pub backend: Option<BackendKind>,
    pub fast_mode: bool,
    pub character_limit: usize,
    pub timeout: Duration,
    pub fast_timeout: Duration,
    pub probe_timeout: Duration,
    pub auto_push: bool,
    pub jobs: usize,
    pub max_diff_lines: usize,
    /// Extra words that mark a message as a performance change.
    pub perf_keywords: Vec<String>,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags
    ///   2. Env vars (`SMART_COMMIT_*`, then the `AI_*` aliases)
    ///   3. TOML `~/.config/smart-commit.toml` (or `--config`)
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = cli
            .config
            .clone()
            .or_else(config_path)
            .and_then(|path| load_file_config(&path))
            .unwrap_or_default();

        Self::resolve(cli, |key| env::var(key).ok(), file_cfg)
    }

    fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>, file_cfg: FileConfig) -> Result<Self> {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| env(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        // clap already folded the SMART_COMMIT_* names into these three.
        let api_url = given(&cli.api_url)
            .or_else(|| lookup(&["AI_API_URL"]))
            .or(file_cfg.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let model = given(&cli.model)
            .or_else(|| lookup(&["AI_MODEL"]))
            .or(file_cfg.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let backend_name = given(&cli.backend)
            .or_else(|| lookup(&["AI_BACKEND_TYPE"]))
            .or(file_cfg.backend)
            .unwrap_or_else(|| "auto".to_string());
        let backend = parse_backend(&backend_name)?;

        let fast_env = lookup(&["SMART_COMMIT_FAST"])
            .map(|v| parse_bool(&v).with_context(|| format!("invalid SMART_COMMIT_FAST value {v:?}")))
            .transpose()?;
        let fast_mode = cli
            .fast_mode()
            .or(fast_env)
            .or(file_cfg.fast_mode)
            .unwrap_or(false);

        let limit_env = lookup(&["SMART_COMMIT_LIMIT"])
            .map(|v| v.parse::<usize>().with_context(|| format!("invalid SMART_COMMIT_LIMIT value {v:?}")))
            .transpose()?;
        let requested_limit = cli
            .limit
            .or(limit_env)
            .or(file_cfg.character_limit)
            .unwrap_or(if fast_mode { FAST_LIMIT } else { DETAILED_LIMIT });
        let character_limit = requested_limit.clamp(MIN_LIMIT, MAX_LIMIT);
        if character_limit != requested_limit {
            log::warn!("Character limit {requested_limit} is outside {MIN_LIMIT}-{MAX_LIMIT}; using {character_limit}");
        }

        let timeout_env = lookup(&["AI_TIMEOUT"])
            .map(|v| v.parse::<u64>().with_context(|| format!("invalid AI_TIMEOUT value {v:?}")))
            .transpose()?;
        let requested_timeout = cli
            .timeout
            .or(timeout_env)
            .or(file_cfg.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let timeout_secs = requested_timeout.clamp(1, MAX_TIMEOUT_SECS);
        if timeout_secs != requested_timeout {
            log::warn!("Timeout {requested_timeout}s is outside 1-{MAX_TIMEOUT_SECS}s; using {timeout_secs}s");
        }

        let requested_jobs = cli.jobs.or(file_cfg.jobs).unwrap_or(1);
        let jobs = requested_jobs.clamp(1, MAX_JOBS);
        if jobs != requested_jobs {
            log::warn!("Jobs {requested_jobs} is outside 1-{MAX_JOBS}; using {jobs}");
        }

        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            backend,
            fast_mode,
            character_limit,
            timeout: Duration::from_secs(timeout_secs),
            fast_timeout: Duration::from_secs(
                file_cfg
                    .fast_timeout_secs
                    .unwrap_or(DEFAULT_FAST_TIMEOUT_SECS)
                    .clamp(1, MAX_TIMEOUT_SECS),
            ),
            probe_timeout: file_cfg
                .probe_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PROBE_TIMEOUT),
            auto_push: !cli.no_push && file_cfg.auto_push.unwrap_or(true),
            jobs,
            max_diff_lines: file_cfg.max_diff_lines.unwrap_or(DEFAULT_MAX_DIFF_LINES).max(1),
            perf_keywords: file_cfg.perf_keywords.unwrap_or_default(),
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            mode: if self.fast_mode {
                PromptMode::Fast
            } else {
                PromptMode::Detailed
            },
            character_limit: self.character_limit,
            timeout: self.timeout,
            fast_timeout: self.fast_timeout,
            jobs: self.jobs,
            auto_push: self.auto_push,
            max_diff_lines: self.max_diff_lines,
        }
    }

    /// The resolved values in config-file form.
    pub fn to_toml(&self) -> Result<String> {
        let view = FileConfig {
            api_url: Some(self.api_url.clone()),
            model: Some(self.model.clone()),
            backend: Some(self.backend.map_or("auto", |k| k.as_str()).to_string()),
            fast_mode: Some(self.fast_mode),
            character_limit: Some(self.character_limit),
            timeout_secs: Some(self.timeout.as_secs()),
            fast_timeout_secs: Some(self.fast_timeout.as_secs()),
            probe_timeout_ms: Some(self.probe_timeout.as_millis() as u64),
            auto_push: Some(self.auto_push),
            jobs: Some(self.jobs),
            max_diff_lines: Some(self.max_diff_lines),
            perf_keywords: Some(self.perf_keywords.clone()),
        };
        toml::to_string(&view).context("failed to render configuration")
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fast_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    character_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fast_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_push: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jobs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_diff_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    perf_keywords: Option<Vec<String>>,
}

/// Map a backend name to a kind; `auto` maps to `None`.
pub fn parse_backend(name: &str) -> Result<Option<BackendKind>> {
    let kind = match name.trim().to_ascii_lowercase().as_str() {
        "" | "auto" => None,
        "ollama" | "native" => Some(BackendKind::Native),
        "openai" | "openai-compatible" | "llamacpp" | "llama.cpp" => Some(BackendKind::OpenAiCompatible),
        other => bail!("unknown backend {other:?}; expected auto, ollama or openai"),
    };
    Ok(kind)
}

/// A CLI (or clap-read env) string, ignoring blanks.
fn given(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

/// Return `~/.config/smart-commit.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("smart-commit.toml"))
}

fn load_file_config(path: &Path) -> Option<FileConfig> {
    if !path.exists() {
        return None;
    }

    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Ignoring unreadable config {}: {e}", path.display());
            return None;
        }
    };

    match toml::from_str::<FileConfig>(&data) {
        Ok(cfg) => {
            log::debug!("Loaded config from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            log::warn!("Ignoring invalid config {}: {e}", path.display());
            None
        }
    }
}
