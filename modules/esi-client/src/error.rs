use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EsiError>;

#[derive(Debug, Error)]
pub enum EsiError {
    #[error("ESI unreachable: {0}")]
    Network(String),

    #[error("ESI request timed out: {0}")]
    Timeout(String),

    #[error("ESI returned {status} for {path}: {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected ESI payload: {0}")]
    Parse(String),
}

/// ESI wraps failures as `{"error": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl EsiError {
    /// Build an `Api` error from a non-2xx response body. The `error` field is
    /// used when the body is ESI's error envelope, otherwise the raw body.
    pub fn api(path: &str, status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => body.trim().to_string(),
        };
        EsiError::Api {
            path: path.to_string(),
            status,
            message,
        }
    }
}

impl From<reqwest::Error> for EsiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EsiError::Timeout(err.to_string())
        } else {
            EsiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EsiError {
    fn from(err: serde_json::Error) -> Self {
        EsiError::Parse(err.to_string())
    }
}
