//! Turns controller events into transcript lines on the terminal.

use std::io::Write;

use client_core::{ClientEvent, Panel};
use shared::domain::{Author, Message};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

fn speaker(message: &Message) -> &'static str {
    match message.author {
        Author::User => "you",
        Author::Assistant => "assistant",
    }
}

pub fn render_event(event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::StatusChanged(text) => Some(format!("[status] {text}")),
        ClientEvent::ProgressShown | ClientEvent::InputCleared => None,
        ClientEvent::ProgressChanged { label, .. } => Some(format!("[upload] {label}")),
        ClientEvent::PanelChanged(Panel::Chat) => {
            Some("--- chat ready: type a message, /help for commands ---".to_string())
        }
        ClientEvent::PanelChanged(Panel::Welcome) => Some("--- waiting for model ---".to_string()),
        ClientEvent::MessageAppended(message) => {
            Some(format!("{}> {}", speaker(message), message.content))
        }
        ClientEvent::MessageUpdated { content, .. } => Some(format!("assistant> {content}")),
        ClientEvent::MessagesCleared => Some("--- conversation cleared ---".to_string()),
        ClientEvent::StateReset => Some("--- session reset ---".to_string()),
        ClientEvent::Error(err) => Some(format!("error: {err}")),
    }
}

/// Prints events until every sender is gone.
pub async fn run(mut events: broadcast::Receiver<ClientEvent>, mut out: impl Write) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render_event(&event) {
                    let _ = writeln!(out, "{line}");
                    let _ = out.flush();
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "render: dropped events while terminal was busy");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
