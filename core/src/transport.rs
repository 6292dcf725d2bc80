//! Messaging transport collaborator interface and message types.

use crate::types::UserId;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Identifier of a message the bot sent, used to edit or delete it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// What the user sent
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Document {
        file_name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
    Photo {
        caption: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub user_id: UserId,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            content: MessageContent::Text(text.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn document(
        user_id: UserId,
        file_name: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            user_id,
            content: MessageContent::Document {
                file_name: file_name.into(),
                mime_type,
                bytes,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn photo(user_id: UserId, caption: Option<String>) -> Self {
        Self {
            user_id,
            content: MessageContent::Photo { caption },
            timestamp: Utc::now(),
        }
    }

    /// Raw text of a text message, if any
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Command name without the slash and any `@bot` suffix, for `/cmd` texts
    pub fn command(&self) -> Option<String> {
        let text = self.as_text()?.trim();
        let rest = text.strip_prefix('/')?;
        let word = rest.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        Some(name.to_ascii_lowercase())
    }
}

/// Reply keyboard to show with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    Keyboard {
        rows: Vec<Vec<String>>,
        one_time: bool,
    },
    Remove,
}

impl ReplyMarkup {
    pub fn keyboard(rows: Vec<Vec<String>>) -> Self {
        ReplyMarkup::Keyboard {
            rows,
            one_time: false,
        }
    }

    pub fn one_time(rows: Vec<Vec<String>>) -> Self {
        ReplyMarkup::Keyboard {
            rows,
            one_time: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAttachment {
    pub path: PathBuf,
    pub title: String,
    pub performer: String,
    pub caption: String,
}

/// One outbound message: text, optional keyboard, optional audio
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
    pub audio: Option<AudioAttachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    pub fn audio(attachment: AudioAttachment) -> Self {
        Self {
            text: String::new(),
            markup: None,
            audio: Some(attachment),
        }
    }
}

/// Message delivery. Implementations must support editing and deleting a
/// previously sent progress message.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, user_id: UserId, reply: Reply) -> Result<MessageId>;

    async fn edit_text(&self, user_id: UserId, message_id: MessageId, text: &str) -> Result<()>;

    async fn delete(&self, user_id: UserId, message_id: MessageId) -> Result<()>;
}
