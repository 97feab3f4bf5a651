//! One-shot backend auto-detection.

use std::time::Duration;

use super::{Backend, BackendKind};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probe `/health` (OpenAI-compatible servers) first, then `/api/tags`
/// (Ollama). When neither answers, `fallback` is kept.
pub fn detect(
    openai: &dyn Backend,
    native: &dyn Backend,
    fallback: BackendKind,
    probe_timeout: Duration,
) -> BackendKind {
    for candidate in [openai, native] {
        if candidate.probe(probe_timeout) {
            log::debug!("Detected {} backend", candidate.kind());
            return candidate.kind();
        }
    }
    log::debug!("No backend answered the probes; keeping {fallback}");
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ollama::OllamaClient;
    use crate::llm::openai::OpenAiClient;
    use crate::llm::stub_server::{Reply, StubServer};

    const PROBE: Duration = Duration::from_millis(300);

    fn detect_against(server: &StubServer, fallback: BackendKind) -> BackendKind {
        let openai = OpenAiClient::new(&server.base_url, "m").unwrap();
        let native = OllamaClient::new(&server.base_url, "m").unwrap();
        detect(&openai, &native, fallback, PROBE)
    }

    #[test]
    fn health_endpoint_selects_openai_compatible() {
        let server = StubServer::start(vec![
            ("/health", Reply::json(200, r#"{"status":"ok"}"#)),
            ("/api/tags", Reply::Hang),
        ]);
        assert_eq!(
            detect_against(&server, BackendKind::Native),
            BackendKind::OpenAiCompatible
        );
    }

    #[test]
    fn tags_endpoint_selects_native() {
        let server = StubServer::start(vec![
            ("/health", Reply::Hang),
            ("/api/tags", Reply::json(200, r#"{"models":[]}"#)),
        ]);
        assert_eq!(
            detect_against(&server, BackendKind::OpenAiCompatible),
            BackendKind::Native
        );
    }

    #[test]
    fn silence_keeps_configured_kind() {
        let server = StubServer::start(vec![("/health", Reply::Hang), ("/api/tags", Reply::Hang)]);
        assert_eq!(
            detect_against(&server, BackendKind::OpenAiCompatible),
            BackendKind::OpenAiCompatible
        );
        assert_eq!(detect_against(&server, BackendKind::Native), BackendKind::Native);
    }

    #[test]
    fn error_statuses_do_not_count() {
        let server = StubServer::start(vec![]);
        assert_eq!(
            detect_against(&server, BackendKind::OpenAiCompatible),
            BackendKind::OpenAiCompatible
        );
    }
}
