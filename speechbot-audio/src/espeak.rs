//! espeak-ng speech engine
//!
//! Runs the local `espeak-ng` (or `espeak`) CLI on a blocking task, writing a
//! WAV file into a scratch directory and returning its bytes.
//!
//! Env overrides:
//! - ESPEAK_BIN
//! - TTS_TIMEOUT_MS, TTS_TEMP_DIR
//! - ESPEAK_VOICE_EN, ESPEAK_VOICE_FA

use crate::utils::{get_from_env_or_path, get_from_path};
use async_trait::async_trait;
use speechbot_core::{AudioFormat, LanguageCode, Speed, SpeechSynthesizer, SynthesisError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::task;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct EspeakConfig {
    pub espeak_bin: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
    pub english_voice: String,
    pub persian_voice: String,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        let timeout_ms = std::env::var("TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(20_000);
        let espeak_bin =
            get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));

        Self {
            espeak_bin,
            temp_dir,
            timeout_ms,
            english_voice: std::env::var("ESPEAK_VOICE_EN").unwrap_or_else(|_| "en".to_string()),
            persian_voice: std::env::var("ESPEAK_VOICE_FA").unwrap_or_else(|_| "fa".to_string()),
        }
    }
}

pub struct EspeakSynthesizer {
    cfg: EspeakConfig,
}

impl EspeakSynthesizer {
    pub fn new(cfg: Option<EspeakConfig>) -> Self {
        let cfg = cfg.unwrap_or_default();
        match &cfg.espeak_bin {
            Some(bin) => info!(target = "tts", bin = ?bin, "Detected espeak-ng binary"),
            None => warn!(target = "tts", "espeak-ng not found; synthesis will fail"),
        }
        Self { cfg }
    }

    pub fn config(&self) -> &EspeakConfig {
        &self.cfg
    }

    fn voice_for(&self, language: LanguageCode) -> &str {
        match language {
            LanguageCode::English => &self.cfg.english_voice,
            LanguageCode::Persian => &self.cfg.persian_voice,
        }
    }
}

/// espeak speaking rate for a playback speed; 1.0 maps to espeak's default
pub fn words_per_minute(speed: Speed) -> i32 {
    (160.0 * speed.value()).round().clamp(80.0, 450.0) as i32
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn synthesize(
        &self,
        text: &str,
        speed: Speed,
        language: LanguageCode,
    ) -> Result<Vec<u8>, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let bin = self
            .cfg
            .espeak_bin
            .clone()
            .ok_or_else(|| SynthesisError::EngineUnavailable("espeak-ng not found".into()))?;

        let wav_path = self
            .cfg
            .temp_dir
            .join(format!("tts_{}.wav", uuid::Uuid::new_v4().simple()));
        let voice = self.voice_for(language).to_string();
        let wpm = words_per_minute(speed);
        let text = text.to_string();
        let out = wav_path.clone();

        let join = task::spawn_blocking(move || -> Result<Vec<u8>, SynthesisError> {
            synth_with_espeak(&bin, &voice, wpm, &text, &out)?;
            let bytes = std::fs::read(&out)?;
            let _ = std::fs::remove_file(&out);
            Ok(bytes)
        });

        match timeout(Duration::from_millis(self.cfg.timeout_ms), join).await {
            Ok(Ok(result)) => {
                if let Ok(bytes) = &result {
                    debug!(target = "tts", wpm, bytes = bytes.len(), "espeak-ng synthesis done");
                }
                result
            }
            Ok(Err(e)) => Err(SynthesisError::EngineFailed(format!("synthesis task failed: {e}"))),
            Err(_) => {
                warn!(target = "tts", timeout_ms = self.cfg.timeout_ms, "espeak-ng timed out");
                let _ = tokio::fs::remove_file(&wav_path).await;
                Err(SynthesisError::Timeout(self.cfg.timeout_ms))
            }
        }
    }
}

fn synth_with_espeak(
    bin: &Path,
    voice: &str,
    wpm: i32,
    text: &str,
    out_wav: &Path,
) -> Result<(), SynthesisError> {
    let mut cmd = Command::new(bin);
    if !voice.is_empty() {
        cmd.arg("-v").arg(voice);
    }
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg("-w").arg(out_wav);
    cmd.arg("--stdin");
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(target = "tts", voice, wpm, "Running espeak-ng");
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let _ = std::fs::remove_file(out_wav);
        return Err(SynthesisError::EngineFailed(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_engine() -> EspeakSynthesizer {
        EspeakSynthesizer::new(Some(EspeakConfig {
            espeak_bin: None,
            temp_dir: std::env::temp_dir(),
            timeout_ms: 1_000,
            english_voice: "en".into(),
            persian_voice: "fa".into(),
        }))
    }

    #[test]
    fn speed_maps_to_words_per_minute() {
        assert_eq!(words_per_minute(Speed::NORMAL), 160);
        assert_eq!(words_per_minute(Speed::new(0.5)), 80);
        assert_eq!(words_per_minute(Speed::new(1.5)), 240);
        assert_eq!(words_per_minute(Speed::new(2.0)), 320);
    }

    #[test]
    fn voice_follows_language() {
        let synth = missing_engine();
        assert_eq!(synth.voice_for(LanguageCode::English), "en");
        assert_eq!(synth.voice_for(LanguageCode::Persian), "fa");
        assert_eq!(synth.audio_format(), AudioFormat::Wav);
    }

    #[tokio::test]
    async fn empty_text_is_refused() {
        let err = missing_engine()
            .synthesize("  ", Speed::NORMAL, LanguageCode::English)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyText));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let err = missing_engine()
            .synthesize("hello", Speed::NORMAL, LanguageCode::English)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EngineUnavailable(_)));
    }
}
