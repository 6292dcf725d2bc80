//! Tempo change for engines without native speed control.
//!
//! Runs `ffmpeg` with the `atempo` filter on a blocking task. The filter keeps
//! pitch and accepts factors in [0.5, 2.0], which covers every speed the bot
//! offers.
//!
//! Env overrides:
//! - FFMPEG_BIN
//! - TTS_TEMP_DIR, TTS_TIMEOUT_MS

use crate::utils::get_from_env_or_path;
use speechbot_core::{AudioFormat, Speed, SynthesisError};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::task;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

const MIN_TEMPO: f32 = 0.5;
const MAX_TEMPO: f32 = 2.0;

#[derive(Clone, Debug)]
pub struct TempoConfig {
    pub ffmpeg_bin: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: get_from_env_or_path("FFMPEG_BIN", "ffmpeg"),
            temp_dir: std::env::var("TTS_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            timeout_ms: std::env::var("TTS_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(20_000),
        }
    }
}

/// The `atempo` factor for a speed, or `None` when the audio is used as is
pub fn atempo_factor(speed: Speed) -> Option<f32> {
    let value = speed.value();
    if (value - 1.0).abs() < f32::EPSILON {
        None
    } else {
        Some(value.clamp(MIN_TEMPO, MAX_TEMPO))
    }
}

/// Re-time `audio` by `factor`, keeping its container.
///
/// Fails rather than returning the input unchanged: audio at the wrong
/// speed is never delivered.
pub async fn change_tempo(
    cfg: &TempoConfig,
    audio: Vec<u8>,
    format: AudioFormat,
    factor: f32,
) -> Result<Vec<u8>, SynthesisError> {
    let bin = cfg.ffmpeg_bin.clone().ok_or_else(|| {
        SynthesisError::EngineUnavailable("ffmpeg not found; cannot change speed".into())
    })?;

    let stem = format!("tempo_{}", uuid::Uuid::new_v4().simple());
    let input = cfg.temp_dir.join(format!("{stem}_in.{}", format.extension()));
    let output = cfg.temp_dir.join(format!("{stem}_out.{}", format.extension()));
    let (job_in, job_out) = (input.clone(), output.clone());

    let join = task::spawn_blocking(move || -> Result<Vec<u8>, SynthesisError> {
        std::fs::write(&job_in, &audio)?;
        let result = run_ffmpeg(&bin, &job_in, &job_out, factor)
            .and_then(|()| std::fs::read(&job_out).map_err(SynthesisError::from));
        let _ = std::fs::remove_file(&job_in);
        let _ = std::fs::remove_file(&job_out);
        result
    });

    match timeout(Duration::from_millis(cfg.timeout_ms), join).await {
        Ok(Ok(result)) => {
            if let Ok(bytes) = &result {
                debug!(target = "tts", factor, bytes = bytes.len(), "Tempo adjusted");
            }
            result
        }
        Ok(Err(e)) => Err(SynthesisError::EngineFailed(format!("tempo task failed: {e}"))),
        Err(_) => {
            warn!(target = "tts", timeout_ms = cfg.timeout_ms, "ffmpeg timed out");
            let _ = tokio::fs::remove_file(&input).await;
            let _ = tokio::fs::remove_file(&output).await;
            Err(SynthesisError::Timeout(cfg.timeout_ms))
        }
    }
}

fn run_ffmpeg(bin: &Path, input: &Path, output: &Path, factor: f32) -> Result<(), SynthesisError> {
    let mut cmd = Command::new(bin);
    cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"]);
    cmd.arg(input);
    cmd.arg("-filter:a").arg(format!("atempo={factor}"));
    cmd.arg(output);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(target = "tts", factor, "Running ffmpeg");
    let result = cmd.output()?;
    if !result.status.success() {
        return Err(SynthesisError::EngineFailed(format!(
            "ffmpeg failed: {}",
            String::from_utf8_lossy(&result.stderr)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_speed_needs_no_tempo_change() {
        assert_eq!(atempo_factor(Speed::NORMAL), None);
        assert_eq!(atempo_factor(Speed::new(1.5)), Some(1.5));
        assert_eq!(atempo_factor(Speed::new(2.0)), Some(2.0));
        assert_eq!(atempo_factor(Speed::new(0.5)), Some(0.5));
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_an_error_not_a_passthrough() {
        let cfg = TempoConfig {
            ffmpeg_bin: None,
            temp_dir: std::env::temp_dir(),
            timeout_ms: 1_000,
        };
        let err = change_tempo(&cfg, b"ID3".to_vec(), AudioFormat::Mp3, 1.5)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EngineUnavailable(_)));
    }
}
