//! In-Memory Backend
//!
//! HashMap-backed byte store. Clones share the same map, which lets tests
//! inspect or corrupt stored bytes behind a connected cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::BackendStore;
use crate::error::{CacheError, Result};

// == Memory Backend ==
/// Process-local backend storing raw bytes in a mutexed map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("memory backend poisoned").len()
    }

    /// Returns true if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BackendStore for MemoryBackend {
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .expect("memory backend poisoned")
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .expect("memory backend poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("memory backend poisoned")
            .remove(key);
        Ok(())
    }
}
