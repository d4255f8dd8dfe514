//! Client errors

use hitl_core::BackendError;
use thiserror::Error;

/// HTTP client failures
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Server {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Body was not the expected JSON
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Interrupt calls need a run thread
    #[error("no thread id configured")]
    NoThread,
}

/// Pull a human message out of an error body
///
/// Understands `{"detail": ...}`, `{"message": ...}` and `{"error": ...}`;
/// anything else is returned trimmed.
#[must_use]
pub fn error_detail(body: &str) -> String {
    if let Ok(serde_json::Value::Object(object)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(serde_json::Value::String(text)) = object.get(key) {
                return text.clone();
            }
        }
    }
    body.trim().to_string()
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Server { status, body } => Self::Http {
                status,
                message: error_detail(&body),
            },
            ClientError::Http(err) if err.is_decode() => Self::Decode(err.to_string()),
            ClientError::Http(err) => Self::Transport(err.to_string()),
            ClientError::Json(err) => Self::Decode(err.to_string()),
            ClientError::NoThread => Self::Rejected("no thread id configured".to_string()),
        }
    }
}
