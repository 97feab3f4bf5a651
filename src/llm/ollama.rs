use std::time::Duration;

use anyhow::{Context, Result};
use musli::json;
use musli::{Decode, Encode};
use reqwest::blocking::Client;

use crate::error::BackendError;

use super::{Backend, BackendKind, BackendReply, truncate_for_log};

#[derive(Debug, Encode)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Decode)]
struct GenerateResponse {
    response: String,
}

/// Synchronous Ollama client using /api/generate.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

impl Backend for OllamaClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn call(&self, prompt: &str, timeout: Duration) -> Result<BackendReply, BackendError> {
        let req_body = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let body_str = json::to_string(&req_body).map_err(|e| {
            BackendError::MalformedResponse(format!("failed to encode Ollama request: {e}"))
        })?;

        log::trace!("Ollama request body: {}", truncate_for_log(&body_str, 2000));

        let url = format!("{}/api/generate", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_str)
            .timeout(timeout)
            .send()
            .map_err(|e| BackendError::from_transport(e, timeout))?;

        let status = resp.status();
        let resp_text = resp
            .text()
            .map_err(|e| BackendError::from_transport(e, timeout))?;

        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: resp_text,
            });
        }

        log::trace!("Ollama raw JSON response: {resp_text}");

        let parsed: GenerateResponse = json::from_str(&resp_text)
            .map_err(|e| BackendError::MalformedResponse(format!("response: {e}")))?;

        Ok(BackendReply {
            raw_text: parsed.response,
            backend_kind: BackendKind::Native,
        })
    }

    fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http.get(&url).timeout(timeout).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("Ollama probe {url} failed: {e}");
                false
            }
        }
    }
}
