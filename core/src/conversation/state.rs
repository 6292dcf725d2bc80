use crate::types::{LanguageCode, Speed};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Closed set of conversation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    LanguageSelection,
    MainMenu,
    AwaitingText,
    AwaitingSpeed,
    ContinuousMode,
    BatchMode,
    /// No conversation in progress: cancelled, or never started
    End,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::LanguageSelection => "LANGUAGE_SELECTION",
            ConversationState::MainMenu => "MAIN_MENU",
            ConversationState::AwaitingText => "AWAITING_TEXT",
            ConversationState::AwaitingSpeed => "AWAITING_SPEED",
            ConversationState::ContinuousMode => "CONTINUOUS_MODE",
            ConversationState::BatchMode => "BATCH_MODE",
            ConversationState::End => "END",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient per-user conversation data.
///
/// `pending_text` is only ever set while the state is `AwaitingSpeed`; the
/// dispatcher clears it on every other transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    pub current_state: ConversationState,
    pub language: LanguageCode,
    pub pending_text: Option<String>,
    pub last_speed: Option<Speed>,
    /// When the user last got a turn
    pub last_active: Instant,
}

impl ConversationContext {
    /// Empty context that has not started a conversation yet
    pub fn new(language: LanguageCode) -> Self {
        Self {
            current_state: ConversationState::End,
            language,
            pending_text: None,
            last_speed: None,
            last_active: Instant::now(),
        }
    }

    /// Speed for continuous mode: the last one used, else `default`
    pub fn speed_or(&self, default: Speed) -> Speed {
        self.last_speed.unwrap_or(default)
    }
}
