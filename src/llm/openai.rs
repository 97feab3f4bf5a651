use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

use super::{Backend, BackendKind, BackendReply, truncate_for_log};

/// Model name that asks the server which model it has loaded.
pub const AUTO_MODEL: &str = "auto";
/// Used when the models listing cannot be read.
pub const PLACEHOLDER_MODEL: &str = "local-model";

/// Minimal request/response structs for the completions API.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
    stop: [&'a str; 1],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for OpenAI-compatible servers (llama.cpp, LM Studio, vLLM).
pub struct OpenAiClient {
    client: Client,
    model: String,
    api_base_url: String,
    resolved_model: OnceLock<String>,
}

impl OpenAiClient {
    pub fn new(api_base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        let base = api_base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);

        Ok(OpenAiClient {
            client,
            model: model.to_string(),
            api_base_url: base.to_string(),
            resolved_model: OnceLock::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// The configured model, or the server's first listed model for "auto".
    fn effective_model(&self, timeout: Duration) -> &str {
        if self.model != AUTO_MODEL {
            return &self.model;
        }
        self.resolved_model.get_or_init(|| match self.first_listed_model(timeout) {
            Ok(id) => {
                log::info!("Resolved model 'auto' to {id:?}");
                id
            }
            Err(e) => {
                log::warn!("Could not list models ({e:#}); using {PLACEHOLDER_MODEL:?}");
                PLACEHOLDER_MODEL.to_string()
            }
        })
    }

    fn first_listed_model(&self, timeout: Duration) -> Result<String> {
        let resp = self
            .client
            .get(self.url("/v1/models"))
            .timeout(timeout)
            .send()
            .context("failed to query /v1/models")?;

        if !resp.status().is_success() {
            return Err(anyhow!("models listing returned HTTP {}", resp.status().as_u16()));
        }

        let list: ModelList = resp.json().context("failed to parse models listing")?;
        list.data
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| anyhow!("models listing is empty"))
    }
}

impl Backend for OpenAiClient {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenAiCompatible
    }

    fn model(&self) -> &str {
        self.resolved_model.get().map(String::as_str).unwrap_or(self.model.as_str())
    }

    fn call(&self, prompt: &str, timeout: Duration) -> Result<BackendReply, BackendError> {
        let model = self.effective_model(timeout);
        let req = CompletionRequest {
            model,
            prompt,
            max_tokens: 100,
            temperature: 0.7,
            stop: ["\n\n"],
        };

        log::trace!("Completion prompt for {model:?}:\n{}", truncate_for_log(prompt, 3000));

        let resp = self
            .client
            .post(self.url("/v1/completions"))
            .json(&req)
            .timeout(timeout)
            .send()
            .map_err(|e| BackendError::from_transport(e, timeout))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| BackendError::from_transport(e, timeout))?;

        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::MalformedResponse(format!("choices[0].text: {e}")))?;

        let raw_text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| BackendError::MalformedResponse("no choices returned".to_string()))?;

        Ok(BackendReply {
            raw_text,
            backend_kind: BackendKind::OpenAiCompatible,
        })
    }

    fn probe(&self, timeout: Duration) -> bool {
        let url = self.url("/health");
        match self.client.get(&url).timeout(timeout).send() {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("Health probe {url} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::stub_server::{Reply, StubServer};

    const COMPLETION: &str = r#"{"id":"c1","object":"text_completion","choices":[{"index":0,"text":"fix(api): handle empty body"}]}"#;

    #[test]
    fn posts_completion_body_and_reads_first_choice() {
        let server = StubServer::start(vec![("/v1/completions", Reply::json(200, COMPLETION))]);
        let client = OpenAiClient::new(&server.base_url, "my-model").unwrap();

        let reply = client.call("describe", Duration::from_secs(5)).unwrap();
        assert_eq!(reply.raw_text, "fix(api): handle empty body");
        assert_eq!(reply.backend_kind, BackendKind::OpenAiCompatible);

        let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
        assert_eq!(body["model"], "my-model");
        assert_eq!(body["prompt"], "describe");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["stop"], serde_json::json!(["\n\n"]));
    }

    #[test]
    fn auto_model_resolves_once_from_listing() {
        let server = StubServer::start(vec![
            ("/v1/models", Reply::json(200, r#"{"data":[{"id":"llama-3.2-3b"},{"id":"other"}]}"#)),
            ("/v1/completions", Reply::json(200, COMPLETION)),
        ]);
        let client = OpenAiClient::new(&server.base_url, AUTO_MODEL).unwrap();

        client.call("a", Duration::from_secs(5)).unwrap();
        client.call("b", Duration::from_secs(5)).unwrap();

        let requests = server.requests();
        let listings = requests.iter().filter(|r| r.path == "/v1/models").count();
        assert_eq!(listings, 1);
        let last: serde_json::Value = serde_json::from_str(&requests.last().unwrap().body).unwrap();
        assert_eq!(last["model"], "llama-3.2-3b");
        assert_eq!(client.model(), "llama-3.2-3b");
    }

    #[test]
    fn auto_model_falls_back_to_placeholder() {
        let server = StubServer::start(vec![("/v1/completions", Reply::json(200, COMPLETION))]);
        let client = OpenAiClient::new(&server.base_url, AUTO_MODEL).unwrap();

        client.call("a", Duration::from_secs(5)).unwrap();
        let body: serde_json::Value = serde_json::from_str(&server.requests().last().unwrap().body).unwrap();
        assert_eq!(body["model"], PLACEHOLDER_MODEL);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let server = StubServer::start(vec![("/v1/completions", Reply::json(200, r#"{"choices":[]}"#))]);
        let client = OpenAiClient::new(&server.base_url, "m").unwrap();
        let err = client.call("p", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn base_url_with_v1_suffix_is_normalised() {
        let server = StubServer::start(vec![("/v1/completions", Reply::json(200, COMPLETION))]);
        let client = OpenAiClient::new(&format!("{}/v1/", server.base_url), "m").unwrap();
        assert!(client.call("p", Duration::from_secs(5)).is_ok());
    }
}
