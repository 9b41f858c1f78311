use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::{ControllerConfig, HttpBackend, PollConfig};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "chat_cli.toml";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub status_timeout_ms: Option<u64>,
    pub allowed_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            poll_max_attempts: poll.max_attempts,
            poll_interval_ms: poll.interval.as_millis() as u64,
            status_timeout_ms: None,
            allowed_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    poll_max_attempts: Option<u32>,
    poll_interval_ms: Option<u64>,
    status_timeout_ms: Option<u64>,
    allowed_extensions: Option<Vec<String>>,
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.poll_max_attempts {
            self.poll_max_attempts = v;
        }
        if let Some(v) = file_cfg.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.status_timeout_ms {
            self.status_timeout_ms = Some(v);
        }
        if let Some(v) = file_cfg.allowed_extensions {
            self.allowed_extensions = v;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MODEL_CHAT_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }

        if let Some(v) = lookup("APP__POLL_MAX_ATTEMPTS") {
            match v.parse::<u32>() {
                Ok(parsed) => self.poll_max_attempts = parsed,
                Err(_) => warn!(value = %v, "ignoring invalid APP__POLL_MAX_ATTEMPTS"),
            }
        }
        if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
            match v.parse::<u64>() {
                Ok(parsed) => self.poll_interval_ms = parsed,
                Err(_) => warn!(value = %v, "ignoring invalid APP__POLL_INTERVAL_MS"),
            }
        }
        if let Some(v) = lookup("APP__STATUS_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(parsed) => self.status_timeout_ms = Some(parsed),
                Err(_) => warn!(value = %v, "ignoring invalid APP__STATUS_TIMEOUT_MS"),
            }
        }

        if let Some(v) = lookup("APP__ALLOWED_EXTENSIONS") {
            self.allowed_extensions = v
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll: PollConfig::new(
                self.poll_max_attempts,
                Duration::from_millis(self.poll_interval_ms),
            ),
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }

    pub fn backend(&self) -> anyhow::Result<HttpBackend> {
        let backend = HttpBackend::new(normalize_server_url(&self.server_url)?);
        Ok(match self.status_timeout_ms {
            Some(ms) => backend.with_status_timeout(Duration::from_millis(ms)),
            None => backend,
        })
    }
}

/// Defaults, then `chat_cli.toml` (or an explicit `--config` file, which must
/// exist), then environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with(path, |key: &str| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            settings.apply_file(file_cfg);
        }
        Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    settings.apply_env(lookup);
    Ok(settings)
}

pub fn normalize_server_url(raw_server_url: &str) -> anyhow::Result<String> {
    let raw_server_url = raw_server_url.trim();
    if raw_server_url.is_empty() {
        return Ok(DEFAULT_SERVER_URL.to_string());
    }

    let candidate = if raw_server_url.contains("://") {
        raw_server_url.to_string()
    } else {
        format!("http://{raw_server_url}")
    };
    let url = Url::parse(&candidate)
        .with_context(|| format!("invalid server url '{raw_server_url}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "unsupported server url scheme '{}' in '{raw_server_url}'",
            url.scheme()
        );
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
