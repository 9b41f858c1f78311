use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Message, MessageId},
    protocol::{ChatResponse, ReloadResponse, StatusResponse, UploadResponse},
};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

mod backend;
pub mod error;
pub mod state;

pub use backend::{HttpBackend, ProgressFn, UploadFile};
pub use error::{BackendError, BackendResult};
pub use state::{AppState, Panel, Phase};

pub const STATUS_UPLOADING: &str = "Uploading...";
pub const STATUS_UPLOAD_ERROR: &str = "Upload error";
pub const STATUS_STARTING: &str = "Starting model...";
pub const STATUS_WAITING: &str = "Waiting for model...";
pub const STATUS_READY: &str = "✅ Model ready";
pub const STATUS_TIMEOUT: &str = "Model start timeout — check console";
pub const STATUS_RELOADING: &str = "Reloading model...";
pub const STATUS_RELOAD_ERROR: &str = "Reload error";
pub const UPLOAD_COMPLETE_DEFAULT: &str = "Upload complete — starting model...";

const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 90;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    /// Delay after every attempt that did not report ready.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    pub poll: PollConfig,
    /// Accepted upload extensions such as `.gguf`; empty accepts anything.
    pub allowed_extensions: Vec<String>,
}

impl ControllerConfig {
    fn normalized_extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect()
    }
}

/// View updates published in the same order as the state mutations behind them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    StatusChanged(String),
    ProgressShown,
    ProgressChanged { percent: u8, label: String },
    PanelChanged(Panel),
    MessageAppended(Message),
    MessageUpdated { id: MessageId, content: String },
    InputCleared,
    MessagesCleared,
    StateReset,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Skipped,
    Rejected { reason: String },
    Failed { error: String },
    Completed { message: String, poll: PollOutcome },
    /// State was reset while the upload was in flight; its result was dropped.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
    AlreadyPolling,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Skipped,
    Replied { id: MessageId, reply: String },
    Failed { id: MessageId, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Failed { error: String },
    Restarted { poll: PollOutcome },
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn upload(&self, file: UploadFile, progress: ProgressFn) -> BackendResult<UploadResponse>;
    async fn check_status(&self) -> BackendResult<StatusResponse>;
    async fn chat(&self, message: &str) -> BackendResult<ChatResponse>;
    async fn reload_model(&self) -> BackendResult<ReloadResponse>;
}

pub fn upload_percent(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let ratio = loaded.min(total) as f64 / total as f64;
    Some((ratio * 100.0).round() as u8)
}

pub struct ClientController {
    backend: Arc<dyn ModelBackend>,
    config: ControllerConfig,
    inner: Mutex<AppState>,
    generation: AtomicU64,
    next_message_id: AtomicU64,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientController {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Arc<Self> {
        Self::with_config(backend, ControllerConfig::default())
    }

    pub fn with_config(backend: Arc<dyn ModelBackend>, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            backend,
            config,
            inner: Mutex::new(AppState::default()),
            generation: AtomicU64::new(0),
            next_message_id: AtomicU64::new(1),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> AppState {
        self.inner.lock().await.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.inner.lock().await.input = text.into();
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn allocate_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Runs `update` under the state lock unless a reset happened since
    /// `generation` was captured. Events are published before the lock is
    /// released so subscribers observe them in mutation order.
    async fn apply<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut AppState, &mut Vec<ClientEvent>),
    {
        let mut state = self.inner.lock().await;
        if self.current_generation() != generation {
            return false;
        }
        let mut events = Vec::new();
        update(&mut *state, &mut events);
        for event in events {
            let _ = self.events.send(event);
        }
        true
    }

    async fn set_status(&self, generation: u64, text: impl Into<String>, phase: Phase) -> bool {
        let text = text.into();
        self.apply(generation, |state, events| {
            state.status_text = text.clone();
            state.phase = phase;
            events.push(ClientEvent::StatusChanged(text));
        })
        .await
    }

    async fn apply_progress(&self, generation: u64, loaded: u64, total: u64) {
        let Some(percent) = upload_percent(loaded, total) else {
            return;
        };
        self.apply(generation, |state, events| {
            if state.progress.is_some_and(|current| current >= percent) {
                return;
            }
            let label = format!("Uploading {percent}%");
            state.progress = Some(percent);
            state.progress_label = label.clone();
            state.phase = Phase::Uploading { percent };
            events.push(ClientEvent::ProgressChanged { percent, label });
        })
        .await;
    }

    pub async fn upload_model(&self, file: Option<UploadFile>) -> UploadOutcome {
        let Some(file) = file else {
            return UploadOutcome::Skipped;
        };
        let generation = self.current_generation();

        let allowed = self.config.normalized_extensions();
        if !allowed.is_empty() {
            let accepted = file
                .extension()
                .is_some_and(|ext| allowed.iter().any(|allowed| *allowed == ext));
            if !accepted {
                let reason = format!("Only {} files are allowed", allowed.join(", "));
                warn!(filename = file.filename(), "upload: rejected by extension filter");
                self.set_status(generation, reason.clone(), Phase::Idle).await;
                return UploadOutcome::Rejected { reason };
            }
        }

        self.apply(generation, |state, events| {
            state.progress_visible = true;
            state.progress = Some(0);
            state.progress_label.clear();
            state.status_text = STATUS_UPLOADING.to_string();
            state.phase = Phase::Uploading { percent: 0 };
            events.push(ClientEvent::ProgressShown);
            events.push(ClientEvent::StatusChanged(STATUS_UPLOADING.to_string()));
        })
        .await;

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(u64, u64)>();
        let progress: ProgressFn = Arc::new(move |loaded: u64, total: u64| {
            let _ = progress_tx.send((loaded, total));
        });

        let upload = self.backend.upload(file, progress);
        tokio::pin!(upload);
        let result = loop {
            tokio::select! {
                biased;
                Some((loaded, total)) = progress_rx.recv() => {
                    self.apply_progress(generation, loaded, total).await;
                }
                result = &mut upload => break result,
            }
        };
        while let Ok((loaded, total)) = progress_rx.try_recv() {
            self.apply_progress(generation, loaded, total).await;
        }

        match result {
            Ok(response) => {
                let message = response
                    .display_text()
                    .unwrap_or(UPLOAD_COMPLETE_DEFAULT)
                    .to_string();
                info!(text = %message, "upload: complete");
                let applied = self
                    .apply(generation, |state, events| {
                        state.progress = Some(100);
                        state.progress_label = message.clone();
                        state.status_text = STATUS_STARTING.to_string();
                        state.phase = Phase::Starting { attempt: 0 };
                        events.push(ClientEvent::ProgressChanged {
                            percent: 100,
                            label: message.clone(),
                        });
                        events.push(ClientEvent::StatusChanged(STATUS_STARTING.to_string()));
                    })
                    .await;
                if !applied {
                    return UploadOutcome::Abandoned;
                }
                let poll = self.poll_ready().await;
                UploadOutcome::Completed { message, poll }
            }
            Err(err) => {
                let error = err.to_string();
                warn!(error = %error, "upload: failed");
                let applied = self
                    .apply(generation, |state, events| {
                        state.status_text = STATUS_UPLOAD_ERROR.to_string();
                        state.phase = Phase::UploadFailed;
                        events.push(ClientEvent::StatusChanged(STATUS_UPLOAD_ERROR.to_string()));
                        events.push(ClientEvent::Error(error.clone()));
                    })
                    .await;
                if !applied {
                    return UploadOutcome::Abandoned;
                }
                UploadOutcome::Failed { error }
            }
        }
    }

    pub async fn poll_ready(&self) -> PollOutcome {
        let generation = {
            let mut state = self.inner.lock().await;
            if state.polling {
                info!("poll: readiness poll already running; skipping duplicate trigger");
                return PollOutcome::AlreadyPolling;
            }
            state.polling = true;
            self.current_generation()
        };

        let outcome = self.run_poll_loop(generation).await;

        // A reset already cleared the flag and may have started a new loop.
        let mut state = self.inner.lock().await;
        if self.current_generation() == generation {
            state.polling = false;
        }
        outcome
    }

    async fn run_poll_loop(&self, generation: u64) -> PollOutcome {
        let PollConfig {
            max_attempts,
            interval,
        } = self.config.poll;
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if self.current_generation() != generation {
                return PollOutcome::Abandoned;
            }

            let applied = match self.backend.check_status().await {
                Ok(StatusResponse { ready: true }) => {
                    info!(attempt, max_attempts, "poll: model ready");
                    let applied = self
                        .apply(generation, |state, events| {
                            state.status_text = STATUS_READY.to_string();
                            state.phase = Phase::Ready;
                            state.panel = Panel::Chat;
                            events.push(ClientEvent::StatusChanged(STATUS_READY.to_string()));
                            events.push(ClientEvent::PanelChanged(Panel::Chat));
                        })
                        .await;
                    return if applied {
                        PollOutcome::Ready { attempts: attempt }
                    } else {
                        PollOutcome::Abandoned
                    };
                }
                Ok(StatusResponse { ready: false }) => {
                    debug!(attempt, max_attempts, "poll: model not ready yet");
                    self.set_status(
                        generation,
                        format!("Starting model... ({attempt}s)"),
                        Phase::Starting { attempt },
                    )
                    .await
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "poll: status check failed");
                    self.set_status(generation, STATUS_WAITING, Phase::Starting { attempt })
                        .await
                }
            };
            if !applied {
                return PollOutcome::Abandoned;
            }

            tokio::time::sleep(interval).await;
        }

        warn!(max_attempts, "poll: attempt budget exhausted");
        if self
            .set_status(generation, STATUS_TIMEOUT, Phase::TimedOut)
            .await
        {
            PollOutcome::TimedOut {
                attempts: max_attempts,
            }
        } else {
            PollOutcome::Abandoned
        }
    }

    pub async fn send_message(&self) -> SendOutcome {
        let (text, placeholder_id) = {
            let mut state = self.inner.lock().await;
            let text = state.input.trim().to_string();
            if text.is_empty() {
                return SendOutcome::Skipped;
            }

            let user = Message::user(self.allocate_id(), text.clone());
            let placeholder = Message::assistant_placeholder(self.allocate_id());
            let placeholder_id = placeholder.id;

            state.messages.push(user.clone());
            let _ = self.events.send(ClientEvent::MessageAppended(user));
            state.input.clear();
            let _ = self.events.send(ClientEvent::InputCleared);
            state.messages.push(placeholder.clone());
            let _ = self.events.send(ClientEvent::MessageAppended(placeholder));

            (text, placeholder_id)
        };

        debug!(message_id = placeholder_id.0, "chat: sending message");
        match self.backend.chat(&text).await {
            Ok(ChatResponse { reply }) => {
                self.resolve_placeholder(placeholder_id, &reply).await;
                SendOutcome::Replied {
                    id: placeholder_id,
                    reply,
                }
            }
            Err(err) => {
                let error = err.to_string();
                warn!(message_id = placeholder_id.0, error = %error, "chat: request failed");
                self.resolve_placeholder(placeholder_id, &format!("⚠️ Error: {error}"))
                    .await;
                SendOutcome::Failed {
                    id: placeholder_id,
                    error,
                }
            }
        }
    }

    pub async fn send_text(&self, text: impl Into<String>) -> SendOutcome {
        self.set_input(text).await;
        self.send_message().await
    }

    async fn resolve_placeholder(&self, id: MessageId, content: &str) {
        let mut state = self.inner.lock().await;
        if state.replace_content(id, content) {
            let _ = self.events.send(ClientEvent::MessageUpdated {
                id,
                content: content.to_string(),
            });
        } else {
            debug!(message_id = id.0, "chat: placeholder no longer present; dropping reply");
        }
    }

    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.messages.clear();
        let _ = self.events.send(ClientEvent::MessagesCleared);
    }

    /// Discards all in-memory state. Flows still in flight stop applying
    /// their results; message ids keep increasing.
    pub async fn reload(&self) {
        let mut state = self.inner.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = AppState::default();
        let _ = self.events.send(ClientEvent::StateReset);
        info!("controller: state reset");
    }

    /// Asks the backend to restart the last uploaded model, then waits for it.
    pub async fn restart_model(&self) -> RestartOutcome {
        let generation = self.current_generation();
        match self.backend.reload_model().await {
            Ok(response) => {
                let status = response
                    .status
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| STATUS_RELOADING.to_string());
                info!(status = %status, "restart: backend accepted reload");
                let applied = self
                    .apply(generation, |state, events| {
                        state.status_text = status.clone();
                        state.phase = Phase::Starting { attempt: 0 };
                        events.push(ClientEvent::StatusChanged(status));
                        if state.panel != Panel::Welcome {
                            state.panel = Panel::Welcome;
                            events.push(ClientEvent::PanelChanged(Panel::Welcome));
                        }
                    })
                    .await;
                let poll = if applied {
                    self.poll_ready().await
                } else {
                    PollOutcome::Abandoned
                };
                RestartOutcome::Restarted { poll }
            }
            Err(err) => {
                let error = err.to_string();
                warn!(error = %error, "restart: backend refused reload");
                self.apply(generation, |state, events| {
                    state.status_text = STATUS_RELOAD_ERROR.to_string();
                    events.push(ClientEvent::StatusChanged(STATUS_RELOAD_ERROR.to_string()));
                    events.push(ClientEvent::Error(error.clone()));
                })
                .await;
                RestartOutcome::Failed { error }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
