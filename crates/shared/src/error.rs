use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the backend attaches to rejected requests, e.g. `{"error": "Empty filename"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    /// Pulls a human-readable explanation out of a non-2xx body.
    ///
    /// The backend uses `error` for upload/reload rejections and `reply` when
    /// the chat endpoint refuses a message; anything else yields `None`.
    pub fn explain(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ["error", "reply"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}

#[derive(Debug, Error)]
#[error("server returned {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_prefers_error_field() {
        assert_eq!(
            ApiError::explain(r#"{"error":"Only .gguf models are allowed"}"#).as_deref(),
            Some("Only .gguf models are allowed")
        );
    }

    #[test]
    fn explain_falls_back_to_reply_field() {
        assert_eq!(
            ApiError::explain(r#"{"reply":"Model is not ready yet."}"#).as_deref(),
            Some("Model is not ready yet.")
        );
    }

    #[test]
    fn explain_ignores_non_json_bodies() {
        assert!(ApiError::explain("<html>502 Bad Gateway</html>").is_none());
        assert!(ApiError::explain(r#"{"detail":"nope"}"#).is_none());
    }
}
