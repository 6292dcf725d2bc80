use std::fs;
use std::path::{Path, PathBuf};

use speechbot_audio::{EngineKind, EspeakConfig, GoogleTtsConfig};
use speechbot_core::telemetry::redact_secrets;
use speechbot_core::{BotConfig, Result, SpeechBotError};

/// Everything the binary needs: core limits plus engine selection
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub engine: EngineKind,
    pub espeak: EspeakConfig,
    pub gtts: GoogleTtsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = std::env::var("SPEECHBOT_ENGINE")
            .ok()
            .and_then(|v| v.parse::<EngineKind>().ok())
            .unwrap_or_default();

        Self {
            bot: BotConfig::default(),
            engine,
            espeak: EspeakConfig::default(),
            gtts: GoogleTtsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (path via SPEECHBOT_CONFIG or ./speechbot.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("SPEECHBOT_CONFIG").unwrap_or_else(|_| "speechbot.toml".into());
        Self::load_from(Path::new(&path))
    }

    /// Overlay a TOML document onto the env-driven defaults
    pub fn parse(text: &str) -> Result<Self> {
        let overlay = toml::from_str::<AppToml>(text)
            .map_err(|e| SpeechBotError::Config(redact_secrets(&e.to_string())))?;
        Ok(overlay.overlay(Self::default()))
    }

    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target = "speechbot", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::parse(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target = "speechbot", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "speechbot", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AppToml {
    pub engine: Option<EngineKind>,
    pub limits: Option<LimitsToml>,
    pub storage: Option<StorageToml>,
    pub cache: Option<CacheToml>,
    pub espeak: Option<EspeakToml>,
    pub gtts: Option<GttsToml>,
}

impl AppToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(e) = self.engine {
            base.engine = e;
        }
        if let Some(l) = self.limits {
            l.apply(&mut base.bot);
        }
        if let Some(s) = self.storage {
            s.apply(&mut base.bot);
        }
        if let Some(c) = self.cache {
            c.apply(&mut base.bot);
        }
        if let Some(e) = self.espeak {
            e.apply(&mut base.espeak);
        }
        if let Some(g) = self.gtts {
            g.apply(&mut base.gtts);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LimitsToml {
    pub max_text_length: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub max_batch_text_length: Option<usize>,
    pub daily_quota_free: Option<u32>,
    pub daily_quota_premium: Option<u32>,
    pub rate_limit_per_minute: Option<usize>,
}
impl LimitsToml {
    fn apply(self, b: &mut BotConfig) {
        if let Some(v) = self.max_text_length {
            b.max_text_length = v;
        }
        if let Some(v) = self.max_batch_size {
            b.max_batch_size = v;
        }
        if let Some(v) = self.max_batch_text_length {
            b.max_batch_text_length = v;
        }
        if let Some(v) = self.daily_quota_free {
            b.daily_quota_free = v;
        }
        if let Some(v) = self.daily_quota_premium {
            b.daily_quota_premium = v;
        }
        if let Some(v) = self.rate_limit_per_minute {
            b.rate_limit_per_minute = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct StorageToml {
    pub database_path: Option<PathBuf>,
    pub audio_temp_dir: Option<PathBuf>,
    pub locales_dir: Option<PathBuf>,
}
impl StorageToml {
    fn apply(self, b: &mut BotConfig) {
        if let Some(v) = self.database_path {
            b.database_path = v;
        }
        if let Some(v) = self.audio_temp_dir {
            b.audio_temp_dir = v;
        }
        if let Some(v) = self.locales_dir {
            b.locales_dir = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CacheToml {
    pub enabled: Option<bool>,
    pub ttl_hours: Option<u64>,
}
impl CacheToml {
    fn apply(self, b: &mut BotConfig) {
        if let Some(v) = self.enabled {
            b.cache_enabled = v;
        }
        if let Some(v) = self.ttl_hours {
            b.cache_ttl = std::time::Duration::from_secs(v.saturating_mul(3600));
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct EspeakToml {
    pub bin: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub voice_en: Option<String>,
    pub voice_fa: Option<String>,
}
impl EspeakToml {
    fn apply(self, e: &mut EspeakConfig) {
        if let Some(x) = self.bin {
            e.espeak_bin = Some(x);
        }
        if let Some(x) = self.temp_dir {
            e.temp_dir = x;
        }
        if let Some(x) = self.timeout_ms {
            e.timeout_ms = x;
        }
        if let Some(x) = self.voice_en {
            e.english_voice = x;
        }
        if let Some(x) = self.voice_fa {
            e.persian_voice = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GttsToml {
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
    pub ffmpeg_bin: Option<std::path::PathBuf>,
}
impl GttsToml {
    fn apply(self, g: &mut GoogleTtsConfig) {
        if let Some(x) = self.endpoint {
            g.endpoint = x;
        }
        if let Some(x) = self.timeout_ms {
            g.timeout_ms = x;
        }
        if let Some(x) = self.ffmpeg_bin {
            g.tempo.ffmpeg_bin = Some(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speechbot.toml");
        fs::write(
            &path,
            r#"
engine = "gtts"

[limits]
daily_quota_free = 7

[cache]
enabled = true
ttl_hours = 2

[gtts]
timeout_ms = 1500
"#,
        )
        .unwrap();

        let base = AppConfig::default();
        let cfg = AppConfig::load_from(&path);
        assert_eq!(cfg.engine, EngineKind::Gtts);
        assert_eq!(cfg.bot.daily_quota_free, 7);
        assert_eq!(cfg.bot.max_text_length, base.bot.max_text_length);
        assert!(cfg.bot.cache_enabled);
        assert_eq!(cfg.bot.cache_ttl, std::time::Duration::from_secs(7200));
        assert_eq!(cfg.gtts.timeout_ms, 1500);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speechbot.toml");
        fs::write(&path, "engine = [").unwrap();

        let cfg = AppConfig::load_from(&path);
        assert_eq!(cfg.bot.max_batch_size, AppConfig::default().bot.max_batch_size);
    }

    #[test]
    fn parse_errors_are_config_errors() {
        let err = AppConfig::parse("engine = [").unwrap_err();
        assert!(matches!(err, SpeechBotError::Config(_)));

        let cfg = AppConfig::parse("[gtts]\nffmpeg_bin = \"/opt/ffmpeg\"\n").unwrap();
        assert_eq!(
            cfg.gtts.tempo.ffmpeg_bin.as_deref(),
            Some(std::path::Path::new("/opt/ffmpeg"))
        );
    }
}
