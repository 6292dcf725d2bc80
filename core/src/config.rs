//! Runtime limits and paths consumed by the core.
//!
//! Defaults match the production values; each can be overridden through the
//! environment:
//! - SPEECHBOT_MAX_TEXT_LENGTH, SPEECHBOT_MAX_BATCH_SIZE, SPEECHBOT_MAX_BATCH_TEXT_LENGTH
//! - SPEECHBOT_DAILY_QUOTA_FREE, SPEECHBOT_DAILY_QUOTA_PREMIUM, SPEECHBOT_RATE_LIMIT
//! - SPEECHBOT_AUDIO_DIR, SPEECHBOT_DATABASE, SPEECHBOT_LOCALES_DIR
//! - SPEECHBOT_CACHE_ENABLED, SPEECHBOT_CACHE_TTL_HOURS

use crate::types::Speed;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub max_text_length: usize,
    pub max_batch_size: usize,
    pub max_batch_text_length: usize,
    pub daily_quota_free: u32,
    /// Stored for forward compatibility; no entitlement flow assigns premium yet
    pub daily_quota_premium: u32,
    pub rate_limit_per_minute: usize,
    pub rate_limit_window: Duration,
    pub default_speed: Speed,
    pub audio_temp_dir: PathBuf,
    pub audio_temp_max_age: Duration,
    pub startup_sweep_age: Duration,
    /// Conversations untouched this long are forgotten by the periodic sweep
    pub idle_context_ttl: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub database_path: PathBuf,
    pub locales_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        let audio_temp_dir = std::env::var("SPEECHBOT_AUDIO_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data").join("temp_audio"));
        let database_path = std::env::var("SPEECHBOT_DATABASE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data").join("bot_data.db"));
        let locales_dir = std::env::var("SPEECHBOT_LOCALES_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let cache_enabled = std::env::var("SPEECHBOT_CACHE_ENABLED")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            max_text_length: env_parse("SPEECHBOT_MAX_TEXT_LENGTH").unwrap_or(5000),
            max_batch_size: env_parse("SPEECHBOT_MAX_BATCH_SIZE").unwrap_or(10),
            max_batch_text_length: env_parse("SPEECHBOT_MAX_BATCH_TEXT_LENGTH").unwrap_or(1000),
            daily_quota_free: env_parse("SPEECHBOT_DAILY_QUOTA_FREE").unwrap_or(5),
            daily_quota_premium: env_parse("SPEECHBOT_DAILY_QUOTA_PREMIUM").unwrap_or(100),
            rate_limit_per_minute: env_parse("SPEECHBOT_RATE_LIMIT").unwrap_or(20),
            rate_limit_window: Duration::from_secs(60),
            default_speed: Speed::NORMAL,
            audio_temp_dir,
            audio_temp_max_age: 24 * HOUR,
            startup_sweep_age: HOUR,
            idle_context_ttl: 24 * HOUR,
            cache_enabled,
            cache_ttl: env_parse::<u64>("SPEECHBOT_CACHE_TTL_HOURS")
                .map(|h| Duration::from_secs(h.saturating_mul(3600)))
                .unwrap_or(24 * HOUR),
            database_path,
            locales_dir,
        }
    }
}

impl BotConfig {
    /// Directory holding content-addressed cached audio
    pub fn cache_dir(&self) -> PathBuf {
        self.audio_temp_dir.join("cache")
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
