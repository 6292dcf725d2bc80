//! Speech synthesis collaborator interface.
//!
//! Engines live outside the core (see the `speechbot-audio` crate); the
//! conversation layer only needs text in, audio bytes out.

use crate::types::{AudioFormat, LanguageCode, Speed};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("engine failed: {0}")]
    EngineFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("synthesis timed out after {0} ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Container of the bytes returned by `synthesize`
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    /// Render `text` at `speed`; a speed of 1.0 must leave pitch untouched
    async fn synthesize(
        &self,
        text: &str,
        speed: Speed,
        language: LanguageCode,
    ) -> Result<Vec<u8>, SynthesisError>;
}
