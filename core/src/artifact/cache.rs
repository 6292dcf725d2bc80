// Content-addressed audio cache
use crate::artifact::sweep_dir;
use crate::types::{AudioFormat, LanguageCode, Speed};
use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Reuses audio for identical (text, speed, language) requests until the TTL expires
pub struct AudioCache {
    dir: PathBuf,
    ttl: Duration,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key(text: &str, speed: Speed, language: LanguageCode) -> String {
        let digest = Sha256::digest(format!("{text}_{speed}_{language}").as_bytes());
        format!("{digest:x}")
    }

    fn path_for(&self, key: &str, format: AudioFormat) -> PathBuf {
        self.dir.join(format!("{key}.{}", format.extension()))
    }

    /// Fresh cached file for the request; a stale one is removed
    pub async fn get(
        &self,
        text: &str,
        speed: Speed,
        language: LanguageCode,
        format: AudioFormat,
    ) -> Option<PathBuf> {
        let key = Self::key(text, speed, language);
        let path = self.path_for(&key, format);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        let age = meta
            .modified()
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .unwrap_or_default();

        if age < self.ttl {
            debug!(target = "artifacts", key = &key[..8], "Cache hit");
            return Some(path);
        }

        let _ = tokio::fs::remove_file(&path).await;
        debug!(target = "artifacts", key = &key[..8], "Removed stale cache entry");
        None
    }

    pub async fn put(
        &self,
        text: &str,
        speed: Speed,
        language: LanguageCode,
        format: AudioFormat,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let key = Self::key(text, speed, language);
        let path = self.path_for(&key, format);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(target = "artifacts", key = &key[..8], "Cached audio");
        Ok(path)
    }

    /// Remove entries older than the TTL
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let removed = sweep_dir(&self.dir, self.ttl).await?;
        if removed > 0 {
            info!(target = "artifacts", removed, "Cleaned up old cache files");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_every_component() {
        let base = AudioCache::key("hello", Speed::NORMAL, LanguageCode::English);
        assert_eq!(base.len(), 64);
        assert_eq!(
            base,
            AudioCache::key("hello", Speed::NORMAL, LanguageCode::English)
        );
        assert_ne!(
            base,
            AudioCache::key("hello", Speed::new(1.5), LanguageCode::English)
        );
        assert_ne!(
            base,
            AudioCache::key("hello", Speed::NORMAL, LanguageCode::Persian)
        );
        assert_ne!(
            base,
            AudioCache::key("hello!", Speed::NORMAL, LanguageCode::English)
        );
    }
}
