//! Filesystem Backend
//!
//! File-per-key byte store. `connect` creates the cache directory and
//! probes it for writability by touching and removing a sentinel file, so
//! an unusable location fails startup instead of the first store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::backend::BackendStore;
use crate::error::{CacheError, Result};

// == Filesystem Backend ==
/// Backend storing each key's bytes in `<cache_path>/<key>.data`.
///
/// Keys are used as file names verbatim; callers are expected to supply
/// path-safe keys (a fronting proxy typically hashes them).
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    cache_path: PathBuf,
}

impl FilesystemBackend {
    // == Constructor ==
    /// Creates a backend rooted at `cache_path`. The directory is created
    /// and validated on `connect`, not here.
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    // == Data File ==
    /// Returns the path holding `key`'s bytes.
    pub fn data_file(&self, key: &str) -> PathBuf {
        self.cache_path.join(format!("{}.data", key))
    }
}

impl BackendStore for FilesystemBackend {
    fn connect(&self) -> Result<()> {
        make_directory(&self.cache_path)
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.data_file(key);
        fs::write(&path, data)?;
        debug!(key, path = %path.display(), bytes = data.len(), "filesystem backend store");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.data_file(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.data_file(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Creates `path` and verifies it is writable by touching a sentinel file.
fn make_directory(path: &Path) -> Result<()> {
    let probe = || -> std::io::Result<()> {
        fs::create_dir_all(path)?;
        let sentinel = path.join(format!(
            ".test.{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("Time went backwards")
                .as_nanos()
        ));
        fs::write(&sentinel, b"")?;
        fs::remove_file(&sentinel)
    };
    probe().map_err(|e| {
        CacheError::NotWritable(format!("[{}] is not writable: {}", path.display(), e))
    })
}
