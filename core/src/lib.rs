// SpeechBot Core Library
// Conversational text-to-speech front-end: session, quota and conversation runtime

pub mod artifact;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod locale;
pub mod quota;
pub mod rate_limit;
pub mod session;
pub mod synth;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod util;
pub mod validation;

// Export core types
pub use artifact::{Artifact, ArtifactManager, AudioCache};
pub use clock::{Clock, SystemClock};
pub use config::BotConfig;
pub use conversation::{ConversationContext, ConversationState, Dispatcher};
pub use locale::Translations;
pub use quota::{QuotaCheck, QuotaGovernor, QuotaStatus};
pub use rate_limit::RateLimiter;
pub use session::{SessionStore, SqliteSessionStore, UserRecord};
pub use synth::{SpeechSynthesizer, SynthesisError};
pub use transport::{
    AudioAttachment, IncomingMessage, MessageContent, MessageId, Reply, ReplyMarkup, Transport,
};
pub use types::{AudioFormat, LanguageCode, Speed, UserId, UserTier};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechBotError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, SpeechBotError>;

use std::sync::Arc;
use tracing::{info, warn};

/// Core runtime: owns the dispatcher and the artifact directory lifecycle
pub struct SpeechBot {
    pub dispatcher: Arc<Dispatcher>,
    pub artifacts: Arc<ArtifactManager>,
    config: Arc<BotConfig>,
}

impl SpeechBot {
    pub fn new(dispatcher: Arc<Dispatcher>, artifacts: Arc<ArtifactManager>) -> Self {
        let config = dispatcher.config();
        Self {
            dispatcher,
            artifacts,
            config,
        }
    }

    /// Prepare directories and sweep artifacts left over from a previous run
    pub async fn start(&self) -> Result<()> {
        info!(target = "speechbot", "Starting SpeechBot...");

        self.artifacts.ensure_dirs().await?;
        match self
            .artifacts
            .cleanup_older_than(self.config.startup_sweep_age)
            .await
        {
            Ok(removed) => info!(target = "speechbot", removed, "Startup artifact sweep done"),
            Err(e) => warn!(target = "speechbot", error = %e, "Startup artifact sweep failed"),
        }
        if let Some(cache) = self.artifacts.cache() {
            if let Err(e) = cache.cleanup_expired().await {
                warn!(target = "speechbot", error = %e, "Audio cache cleanup failed");
            }
        }

        info!(target = "speechbot", "SpeechBot started successfully");
        Ok(())
    }

    /// Periodic sweep: artifacts past `audio_temp_max_age` and expired cache
    /// entries. Idle conversations and empty rate windows are dropped too.
    /// Returns the number of files removed.
    pub async fn sweep_stale(&self) -> Result<usize> {
        let contexts = self.dispatcher.evict_idle(self.config.idle_context_ttl);
        let windows = self.dispatcher.rate_limiter().prune_idle();
        if contexts > 0 || windows > 0 {
            info!(target = "speechbot", contexts, windows, "Dropped idle user state");
        }

        let mut removed = self
            .artifacts
            .cleanup_older_than(self.config.audio_temp_max_age)
            .await?;
        if let Some(cache) = self.artifacts.cache() {
            removed += cache.cleanup_expired().await?;
        }
        Ok(removed)
    }

    /// Remove every remaining temporary artifact
    pub async fn shutdown(&self) -> Result<()> {
        info!(target = "speechbot", "Shutting down SpeechBot...");

        let removed = self
            .artifacts
            .cleanup_older_than(std::time::Duration::ZERO)
            .await?;

        info!(target = "speechbot", removed, "SpeechBot shut down successfully");
        Ok(())
    }
}
