//! Task entry storage with scoped locking
//!
//! Writers take an exclusive lock and readers a shared lock on the entry
//! file, both released on every exit path, so a reader can never observe a
//! partially written entry and two writers can never interleave. The
//! locking contract lives behind the `Store` trait so the pipeline can be
//! exercised against an in-memory store in tests.

use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read as IoRead, Write as IoWrite};
use std::path::{Path, PathBuf};
use taskprobe_core::{Error, Result, Task};

/// Latest-record-per-key storage.
///
/// `write` fully replaces the entry for a key; `read` returns
/// `Error::NotFound` for a key that was never written, which callers must
/// treat as a normal empty state rather than a failure.
pub trait Store: Send + Sync {
    /// Replace the entry for `key` with `task`. A degenerate key (empty or
    /// unsafe as a filename component) is a silent no-op: it means "no
    /// identity of this kind assigned", not a failure.
    fn write(&self, key: &str, task: &Task) -> Result<()>;

    /// Read the entry for `key`.
    fn read(&self, key: &str) -> Result<Task>;
}

/// Whether a key is usable as a single filename component
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.chars().any(|c| matches!(c, '/' | '\\' | '\0'))
}

/// RAII lock over one entry file, released on drop
struct LockedEntry {
    file: File,
}

impl LockedEntry {
    /// Open (creating if needed) and exclusively lock an entry file
    fn exclusive(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Open an existing entry file under a shared lock
    fn shared(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }
}

impl Drop for LockedEntry {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Filesystem-backed store: one `<key>.json` file per key inside a
/// namespace directory. The directory is created once at namespace open,
/// not per write.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Create a store over an existing namespace directory
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The namespace directory this store owns
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for FsStore {
    fn write(&self, key: &str, task: &Task) -> Result<()> {
        if !is_safe_key(key) {
            tracing::debug!(key, "skipping write for degenerate cache key");
            return Ok(());
        }
        let path = self.entry_path(key);

        let mut body = serde_json::to_vec(task)
            .map_err(|e| Error::io(&path, "encode", io::Error::new(io::ErrorKind::InvalidData, e)))?;
        body.push(b'\n');

        // Truncate only after the exclusive lock is held, so a concurrent
        // reader sees either the old entry or the new one in full.
        let mut entry =
            LockedEntry::exclusive(&path).map_err(|e| Error::io(&path, "open", e))?;
        entry
            .file
            .set_len(0)
            .and_then(|()| entry.file.write_all(&body))
            .and_then(|()| entry.file.flush())
            .map_err(|e| Error::io(&path, "write", e))
    }

    fn read(&self, key: &str) -> Result<Task> {
        if !is_safe_key(key) {
            return Err(Error::not_found(key));
        }
        let path = self.entry_path(key);

        let mut entry = match LockedEntry::shared(&path) {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::not_found(key));
            }
            Err(e) => return Err(Error::io(&path, "open", e)),
        };

        let mut body = Vec::new();
        entry
            .file
            .read_to_end(&mut body)
            .map_err(|e| Error::io(&path, "read", e))?;

        serde_json::from_slice(&body).map_err(|e| Error::decode(&path, e))
    }
}

/// In-memory store for pipeline and walker tests
#[derive(Debug, Default)]
pub struct MemStore {
    entries: RwLock<HashMap<String, Task>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemStore {
    fn write(&self, key: &str, task: &Task) -> Result<()> {
        if !is_safe_key(key) {
            tracing::debug!(key, "skipping write for degenerate cache key");
            return Ok(());
        }
        self.entries.write().insert(key.to_string(), task.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Task> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn task(uuid: &str, secs: i64) -> Task {
        Task {
            uuid: uuid.to_string(),
            updated: Utc.timestamp_opt(secs, 0).unwrap(),
            state: "completed".to_string(),
            ..Task::default()
        }
    }

    #[test]
    fn round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        let written = task("u-1", 1_700_000_000);
        store.write("u-1", &written).unwrap();
        let read = store.read("u-1").unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        let err = store.read("absent").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn degenerate_keys_produce_no_files() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        for key in ["", ".", "..", "a/b", "a\\b"] {
            store.write(key, &task("u-1", 0)).unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_entry_is_decode_not_absent() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let err = store.read("bad").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn overwrite_replaces_whole_entry() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        // The second record serializes shorter than the first; stale bytes
        // must not survive the replace.
        let long = Task {
            started_by_user: "someone with a very long account name".to_string(),
            ..task("u-1", 1)
        };
        store.write("u-1", &long).unwrap();
        let short = task("u-1", 2);
        store.write("u-1", &short).unwrap();
        assert_eq!(store.read("u-1").unwrap(), short);
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        let mut handles = Vec::new();
        for writer in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for round in 0..25 {
                    let t = task(&format!("writer-{writer}-round-{round}"), round);
                    store.write("shared", &t).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Whatever won, the entry decodes as one complete record.
        let survivor = store.read("shared").unwrap();
        assert!(survivor.uuid.starts_with("writer-"));
    }

    #[test]
    fn mem_store_matches_contract() {
        let store = MemStore::new();
        assert!(store.read("k").unwrap_err().is_not_found());

        let written = task("u-2", 42);
        store.write("k", &written).unwrap();
        assert_eq!(store.read("k").unwrap(), written);

        store.write("", &written).unwrap();
        assert_eq!(store.len(), 1);
    }
}
