//! reqwest implementation of [`crate::ModelBackend`].

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    stream::{self, BoxStream},
    StreamExt, TryStreamExt,
};
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response,
};
use shared::{
    error::{ApiError, ApiException},
    protocol::{
        ChatRequest, ChatResponse, ReloadResponse, StatusResponse, UploadResponse, CHAT_PATH,
        CHECK_STATUS_PATH, RELOAD_PATH, UPLOAD_FIELD, UPLOAD_PATH,
    },
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::{
    error::{BackendError, BackendResult},
    ModelBackend,
};

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Receives `(loaded, total)` byte counts while an upload body is streamed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Clone)]
enum UploadSource {
    Path(PathBuf),
    Bytes(Arc<Vec<u8>>),
}

/// A file selected for upload, read lazily in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct UploadFile {
    filename: String,
    len: u64,
    source: UploadSource,
}

impl UploadFile {
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        Ok(Self {
            filename,
            len: metadata.len(),
            source: UploadSource::Path(path),
        })
    }

    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            filename: filename.into(),
            len: bytes.len() as u64,
            source: UploadSource::Bytes(Arc::new(bytes)),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lower-cased extension including the leading dot, e.g. `.gguf`.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
    }

    /// Opens the source and yields its content chunk by chunk, reporting the
    /// running byte count to `progress` as each chunk is produced.
    pub async fn into_chunks(
        self,
        progress: ProgressFn,
    ) -> io::Result<BoxStream<'static, io::Result<Vec<u8>>>> {
        let total = self.len;
        let chunks = match self.source {
            UploadSource::Bytes(bytes) => {
                let pieces: Vec<io::Result<Vec<u8>>> = bytes
                    .chunks(UPLOAD_CHUNK_BYTES)
                    .map(|chunk| Ok(chunk.to_vec()))
                    .collect();
                stream::iter(pieces).boxed()
            }
            UploadSource::Path(path) => {
                let file = tokio::fs::File::open(&path).await?;
                stream::try_unfold(file, |mut file| async move {
                    let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
                    let read = file.read(&mut buf).await?;
                    if read == 0 {
                        return Ok::<_, io::Error>(None);
                    }
                    buf.truncate(read);
                    Ok::<_, io::Error>(Some((buf, file)))
                })
                .boxed()
            }
        };

        let mut loaded = 0u64;
        Ok(chunks
            .inspect_ok(move |chunk| {
                loaded += chunk.len() as u64;
                progress(loaded, total);
            })
            .boxed())
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    server_url: String,
    status_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            status_timeout: None,
        }
    }

    /// Bounds each readiness check; uploads and chat requests stay unbounded.
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = Some(timeout);
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

async fn ensure_success(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = ApiError::explain(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(ApiException::new(status.as_u16(), message).into())
}

#[async_trait]
impl ModelBackend for HttpBackend {
    async fn upload(&self, file: UploadFile, progress: ProgressFn) -> BackendResult<UploadResponse> {
        let filename = file.filename().to_string();
        let len = file.len();
        let chunks = file.into_chunks(progress).await?;

        let part = Part::stream_with_length(Body::wrap_stream(chunks), len)
            .file_name(filename.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        info!(filename = %filename, bytes = len, "upload: sending model file");
        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;

        Ok(serde_json::from_str(&body).unwrap_or_else(|err| {
            debug!(error = %err, "upload: response body is not the expected json");
            UploadResponse::default()
        }))
    }

    async fn check_status(&self) -> BackendResult<StatusResponse> {
        let mut request = self.http.get(self.endpoint(CHECK_STATUS_PATH));
        if let Some(timeout) = self.status_timeout {
            request = request.timeout(timeout);
        }
        let body = ensure_success(request.send().await?).await?.text().await?;
        serde_json::from_str(&body).map_err(|err| BackendError::Malformed(err.to_string()))
    }

    async fn chat(&self, message: &str) -> BackendResult<ChatResponse> {
        let response = self
            .http
            .post(self.endpoint(CHAT_PATH))
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|err| BackendError::Malformed(err.to_string()))
    }

    async fn reload_model(&self) -> BackendResult<ReloadResponse> {
        let response = self.http.post(self.endpoint(RELOAD_PATH)).send().await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
