use serde::{Deserialize, Deserializer, Serialize};

pub const UPLOAD_PATH: &str = "/upload";
pub const CHECK_STATUS_PATH: &str = "/check_status";
pub const CHAT_PATH: &str = "/chat";
pub const RELOAD_PATH: &str = "/reload";

/// Multipart form field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Body of a successful `POST /upload`. Both fields are optional; the
/// reference backend answers with `status`, other deployments with `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UploadResponse {
    pub fn display_text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or_else(|| {
                self.status
                    .as_deref()
                    .filter(|text| !text.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    /// Absent or `null` both mean "not ready".
    #[serde(default, deserialize_with = "null_as_false")]
    pub ready: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReloadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_message_falls_through_to_status() {
        let response: UploadResponse = serde_json::from_str(
            r#"{"message":"","status":"Model uploaded. Starting server..."}"#,
        )
        .unwrap();
        assert_eq!(
            response.display_text(),
            Some("Model uploaded. Starting server...")
        );
    }

    #[test]
    fn message_wins_over_status() {
        let response = UploadResponse {
            message: Some("stored".into()),
            status: Some("starting".into()),
        };
        assert_eq!(response.display_text(), Some("stored"));
        assert_eq!(UploadResponse::default().display_text(), None);
    }

    #[test]
    fn null_or_missing_ready_means_not_ready() {
        for body in [r#"{"ready":null}"#, "{}"] {
            let status: StatusResponse = serde_json::from_str(body).unwrap();
            assert!(!status.ready, "{body}");
        }
        let status: StatusResponse = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert!(status.ready);
    }
}
