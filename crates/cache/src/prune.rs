//! Retention-based cache housekeeping
//!
//! The ingestion path never deletes entries; this sweep removes files whose
//! modification time has aged out of the retention window. It judges age by
//! mtime, not record content, and tolerates entries vanishing underneath it.

use std::path::Path;
use std::time::{Duration, SystemTime};
use taskprobe_core::{Error, Result};

/// Remove entry files in `dir` older than `retention`. Returns the number
/// of files removed.
pub fn prune_namespace(dir: &Path, retention: Duration) -> Result<usize> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, "scan", e))?;
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, "scan", e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!("skipping unreadable entry {}: {}", path.display(), e);
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < retention {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("pruned stale entry {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("failed to prune {}: {}", path.display(), e);
            }
        }
    }

    Ok(removed)
}
