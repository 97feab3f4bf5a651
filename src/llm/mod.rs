pub mod detect;
pub mod ollama;
pub mod openai;
pub mod prompt_builder;
mod prompts;

#[cfg(test)]
pub(crate) mod stub_server;

use std::fmt;
use std::time::Duration;

use anyhow::Result;

use crate::error::BackendError;

use self::ollama::OllamaClient;
use self::openai::OpenAiClient;

/// Wire format spoken by an inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Ollama-style `/api/generate`.
    Native,
    /// OpenAI-style `/v1/completions` (llama.cpp server, LM Studio, vLLM...).
    OpenAiCompatible,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "ollama",
            BackendKind::OpenAiCompatible => "openai-compatible",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text returned by a backend, before extraction.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub raw_text: String,
    pub backend_kind: BackendKind,
}

/// Trait for talking to an inference backend.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn model(&self) -> &str;

    /// Send one prompt, bounded by `timeout`.
    fn call(&self, prompt: &str, timeout: Duration) -> Result<BackendReply, BackendError>;

    /// Cheap liveness check against the backend's own health/listing route.
    fn probe(&self, timeout: Duration) -> bool;
}

/// Construct the client for a known kind.
pub fn build_backend(kind: BackendKind, base_url: &str, model: &str) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match kind {
        BackendKind::Native => Box::new(OllamaClient::new(base_url, model)?),
        BackendKind::OpenAiCompatible => Box::new(OpenAiClient::new(base_url, model)?),
    };
    Ok(backend)
}

/// Pick the backend for this run: the configured kind, or the detected one
/// when `configured` is `None` ("auto").
pub fn select_backend(
    configured: Option<BackendKind>,
    base_url: &str,
    model: &str,
    probe_timeout: Duration,
) -> Result<Box<dyn Backend>> {
    let kind = match configured {
        Some(kind) => kind,
        None => {
            let native = OllamaClient::new(base_url, model)?;
            let openai = OpenAiClient::new(base_url, model)?;
            detect::detect(&openai, &native, BackendKind::Native, probe_timeout)
        }
    };

    log::info!("Using {kind} backend at {base_url} (model {model})");
    build_backend(kind, base_url, model)
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{head}...\n[truncated {} chars]", s.chars().count() - max_len)
    }
}
