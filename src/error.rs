use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single backend call.
///
/// Every variant is treated as "unreachable" by the orchestrator: the first
/// failure degrades to fast-mode generation, a second one is terminal.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend did not answer within {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error("could not reach backend: {0}")]
    Connection(String),

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend reply is missing the expected field: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Whether one degraded retry is worth attempting. Every failure mode
    /// qualifies; the caller bounds the retry count.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout { .. }
                | BackendError::Connection(_)
                | BackendError::Http { .. }
                | BackendError::MalformedResponse(_)
        )
    }

    /// Map a transport error from reqwest into the backend taxonomy.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout { after: timeout }
        } else if err.is_decode() {
            BackendError::MalformedResponse(err.to_string())
        } else {
            BackendError::Connection(err.to_string())
        }
    }
}

/// Repository-level conditions that stop a run before any backend call.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{} is not a git repository", .0.display())]
    NotARepository(PathBuf),

    #[error("no staged, unstaged or untracked changes")]
    NoChanges,
}
