use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(MessageId);

/// Content shown for an assistant turn while its reply is outstanding.
pub const PLACEHOLDER_CONTENT: &str = "…";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            author: Author::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            author: Author::Assistant,
            content: PLACEHOLDER_CONTENT.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.author == Author::Assistant && self.content == PLACEHOLDER_CONTENT
    }
}
