//! Rate limiting and retry for calls against third-party APIs.

pub mod rate_limiter;
pub mod retry;

use thiserror::Error;

/// Failure of one remote call, classified for the retry loop.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote returned HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl RemoteError {
    /// 429, 5xx and network-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Status(status) => *status == 429 || (500..=599).contains(status),
            RemoteError::Network(_) => true,
            RemoteError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}
