//! Small value types shared by every component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable per-user identifier as delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Closed set of interface languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "fa")]
    Persian,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 2] = [LanguageCode::English, LanguageCode::Persian];

    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Persian => "fa",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(LanguageCode::English),
            "fa" => Some(LanguageCode::Persian),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Subscription tier. Only `Free` has a reachable ceiling today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    #[default]
    Free,
    Premium,
}

impl UserTier {
    pub fn as_str(self) -> &'static str {
        match self {
            UserTier::Free => "free",
            UserTier::Premium => "premium",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("premium") {
            UserTier::Premium
        } else {
            UserTier::Free
        }
    }
}

/// Playback speed multiplier, nominal range 0.5–2.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Speed(f32);

impl Speed {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;
    pub const NORMAL: Speed = Speed(1.0);

    /// Speeds offered on the selection keyboard
    pub const CHOICES: [Speed; 4] = [Speed(0.5), Speed(1.0), Speed(1.5), Speed(2.0)];

    pub fn new(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(Self::MIN, Self::MAX))
        } else {
            Self::NORMAL
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Keyboard token for this speed, e.g. `1.5x`
    pub fn token(self) -> String {
        format!("{:.1}x", self.0)
    }

    /// Parse one of the offered keyboard tokens (`0.5x`, `1.0x`, `1.5x`, `2.0x`)
    pub fn parse_token(input: &str) -> Option<Speed> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::CHOICES
            .iter()
            .copied()
            .find(|s| s.token() == normalized)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Container produced by a speech engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_tokens_parse() {
        assert_eq!(Speed::parse_token("0.5x"), Some(Speed::new(0.5)));
        assert_eq!(Speed::parse_token(" 2.0X "), Some(Speed::new(2.0)));
        assert_eq!(Speed::parse_token("3.0x"), None);
        assert_eq!(Speed::parse_token("fast"), None);
    }

    #[test]
    fn speed_is_clamped() {
        assert_eq!(Speed::new(5.0).value(), 2.0);
        assert_eq!(Speed::new(0.1).value(), 0.5);
        assert_eq!(Speed::new(f32::NAN), Speed::NORMAL);
    }

    #[test]
    fn language_codes_roundtrip() {
        for lang in LanguageCode::ALL {
            assert_eq!(LanguageCode::from_code(lang.code()), Some(lang));
        }
        assert_eq!(LanguageCode::from_code("de"), None);
    }
}
