//! View-independent application state owned by [`crate::ClientController`].

use shared::domain::{Author, Message, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading {
        percent: u8,
    },
    UploadFailed,
    Starting {
        attempt: u32,
    },
    Ready,
    TimedOut,
}

/// Which of the two top-level panels is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Welcome,
    Chat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub messages: Vec<Message>,
    pub input: String,
    pub status_text: String,
    pub progress_visible: bool,
    pub progress: Option<u8>,
    pub progress_label: String,
    pub phase: Phase,
    pub panel: Panel,
    pub polling: bool,
}

impl AppState {
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.author == Author::Assistant)
    }

    pub fn pending_replies(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }

    /// Replaces the content of message `id`. Returns `false` when the message
    /// is gone (cleared or reset while its reply was outstanding).
    pub(crate) fn replace_content(&mut self, id: MessageId, content: &str) -> bool {
        match self.messages.iter_mut().find(|message| message.id == id) {
            Some(message) => {
                message.content = content.to_string();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
