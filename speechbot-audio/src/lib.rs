// Speech engines implementing `speechbot_core::SpeechSynthesizer`

pub(crate) mod utils;

pub mod espeak;
pub mod gtts;
pub mod tempo;

pub use espeak::{EspeakConfig, EspeakSynthesizer};
pub use gtts::{split_into_chunks, GoogleTtsConfig, GoogleTtsSynthesizer};
pub use tempo::TempoConfig;

use serde::{Deserialize, Serialize};

/// Engines the binary can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Espeak,
    Gtts,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(EngineKind::Espeak),
            "gtts" | "google" => Ok(EngineKind::Gtts),
            other => Err(format!("unknown engine: {other}")),
        }
    }
}
