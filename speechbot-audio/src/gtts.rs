//! Google Translate TTS engine over HTTP
//!
//! The endpoint accepts at most ~200 characters per request, so text is split
//! on word boundaries and the MP3 bodies are concatenated. Speeds below 0.8
//! use the engine's slow mode; other speeds besides 1.0 are re-timed with
//! ffmpeg afterwards (see `tempo`).
//!
//! Env overrides:
//! - GTTS_ENDPOINT, GTTS_TIMEOUT_MS

use crate::tempo::{self, TempoConfig};
use async_trait::async_trait;
use speechbot_core::{AudioFormat, LanguageCode, Speed, SpeechSynthesizer, SynthesisError};
use std::time::Duration;
use tracing::{debug, warn};

pub const MAX_CHUNK_CHARS: usize = 200;

/// Speeds below this use the engine's slow mode
const SLOW_MODE_BELOW: f32 = 0.8;

#[derive(Clone, Debug)]
pub struct GoogleTtsConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub tempo: TempoConfig,
}

impl Default for GoogleTtsConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("GTTS_ENDPOINT")
                .unwrap_or_else(|_| "https://translate.google.com/translate_tts".to_string()),
            timeout_ms: std::env::var("GTTS_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30_000),
            user_agent: "Mozilla/5.0 (compatible; SpeechBot/0.1)".to_string(),
            tempo: TempoConfig::default(),
        }
    }
}

pub struct GoogleTtsSynthesizer {
    config: GoogleTtsConfig,
    http_client: reqwest::Client,
}

impl GoogleTtsSynthesizer {
    pub fn new() -> Self {
        Self::with_config(GoogleTtsConfig::default())
    }

    pub fn with_config(config: GoogleTtsConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        index: usize,
        total: usize,
        language: LanguageCode,
        tts_speed: &str,
    ) -> Result<Vec<u8>, SynthesisError> {
        let params = [
            ("ie", "UTF-8".to_string()),
            ("q", chunk.to_string()),
            ("tl", language.code().to_string()),
            ("total", total.to_string()),
            ("idx", index.to_string()),
            ("textlen", chunk.chars().count().to_string()),
            ("client", "tw-ob".to_string()),
            ("ttsspeed", tts_speed.to_string()),
        ];

        let response = self
            .http_client
            .get(&self.config.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(target = "tts", error = %e, "TTS request failed");
                if e.is_timeout() {
                    SynthesisError::Timeout(self.config.timeout_ms)
                } else {
                    SynthesisError::Http(format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(target = "tts", status = %status, "TTS endpoint returned error");
            return Err(SynthesisError::Http(format!("TTS endpoint returned status: {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Http(format!("failed to read TTS response: {e}")))?;
        Ok(body.to_vec())
    }
}

impl Default for GoogleTtsSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// The `ttsspeed` parameter for a playback speed
pub fn tts_speed_param(speed: Speed) -> &'static str {
    if speed.value() < SLOW_MODE_BELOW {
        "0.24"
    } else {
        "1"
    }
}

/// Tempo factor applied after download; slow mode already covers low speeds
pub fn post_tempo(speed: Speed) -> Option<f32> {
    if speed.value() < SLOW_MODE_BELOW {
        None
    } else {
        tempo::atempo_factor(speed)
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking on
/// whitespace where possible. Words longer than the limit are cut.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word = word;
        let mut word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        while word_len > max_chars {
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            chunks.push(word[..split_at].to_string());
            word = &word[split_at..];
            word_len -= max_chars;
        }
        if word.is_empty() {
            continue;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsSynthesizer {
    fn name(&self) -> &str {
        "gtts"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn synthesize(
        &self,
        text: &str,
        speed: Speed,
        language: LanguageCode,
    ) -> Result<Vec<u8>, SynthesisError> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let tts_speed = tts_speed_param(speed);
        let total = chunks.len();
        let mut audio = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let bytes = self
                .fetch_chunk(chunk, index, total, language, tts_speed)
                .await?;
            audio.extend_from_slice(&bytes);
        }

        debug!(target = "tts", chunks = total, bytes = audio.len(), "Google TTS synthesis done");
        match post_tempo(speed) {
            Some(factor) => {
                tempo::change_tempo(&self.config.tempo, audio, self.audio_format(), factor).await
            }
            None => Ok(audio),
        }
    }
}
