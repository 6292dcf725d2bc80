//! Temporary audio artifacts: naming, saving, deletion, age-based sweeps and
//! the optional content-addressed cache.

pub mod cache;
pub mod manager;

pub use cache::AudioCache;
pub use manager::{Artifact, ArtifactManager};

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Remove regular files in `dir` last written at or before `now - age`.
/// Subdirectories are left alone. A missing directory counts as empty.
pub(crate) async fn sweep_dir(dir: &Path, age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(target = "artifacts", path = %entry.path().display(), error = %e, "Cannot stat entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let written = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if written <= cutoff {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    removed += 1;
                    debug!(target = "artifacts", path = %entry.path().display(), "Removed stale file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(target = "artifacts", path = %entry.path().display(), error = %e, "Failed to remove stale file");
                }
            }
        }
    }
    Ok(removed)
}
