use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Status(#[from] ApiException),
    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// HTTP status attached to the failure, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(err) => Some(err.status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::Io(_) | Self::Malformed(_) => None,
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
