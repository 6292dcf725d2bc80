use crate::artifact::cache::AudioCache;
use crate::artifact::sweep_dir;
use crate::config::BotConfig;
use crate::types::AudioFormat;
use crate::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A produced audio file awaiting delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Owned by the cache: survives delivery until its TTL expires
    pub cached: bool,
}

/// Owns the temporary audio directory.
///
/// Every artifact handed out for delivery is removed after delivery (or on
/// failure), and anything left behind is removed by the next sweep.
pub struct ArtifactManager {
    dir: PathBuf,
    cache: Option<AudioCache>,
    seq: AtomicU64,
}

impl ArtifactManager {
    pub fn new(dir: impl Into<PathBuf>, cache: Option<AudioCache>) -> Self {
        Self {
            dir: dir.into(),
            cache,
            seq: AtomicU64::new(0),
        }
    }

    /// Cache is attached only when enabled in config
    pub fn from_config(config: &BotConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| AudioCache::new(config.cache_dir(), config.cache_ttl));
        Self::new(config.audio_temp_dir.clone(), cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache(&self) -> Option<&AudioCache> {
        self.cache.as_ref()
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        if let Some(cache) = &self.cache {
            tokio::fs::create_dir_all(cache.dir()).await?;
        }
        Ok(())
    }

    /// Unique file name: local timestamp, process-wide sequence and a random suffix
    pub fn generate_name(&self, format: AudioFormat) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "audio_{}_{:04}_{}.{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            seq % 10_000,
            &suffix[..8],
            format.extension()
        )
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn save(&self, bytes: &[u8], name: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        tokio::fs::create_dir_all(&self.dir).await?;
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            warn!(target = "artifacts", name, error = %e, "Failed to save audio file");
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        debug!(target = "artifacts", name, bytes = bytes.len(), "Saved audio file");
        Ok(path)
    }

    /// Remove a file; absent files are not an error
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(target = "artifacts", path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a delivered or abandoned artifact unless the cache owns it
    pub async fn release(&self, artifact: &Artifact) {
        if artifact.cached {
            return;
        }
        if let Err(e) = self.delete(&artifact.path).await {
            warn!(target = "artifacts", path = %artifact.path.display(), error = %e, "Failed to clean up artifact");
        }
    }

    /// Single pass over the artifact directory removing files older than `age`
    pub async fn cleanup_older_than(&self, age: Duration) -> Result<usize> {
        let removed = sweep_dir(&self.dir, age).await?;
        if removed > 0 {
            info!(target = "artifacts", removed, "Cleaned up old audio files");
        }
        Ok(removed)
    }
}
