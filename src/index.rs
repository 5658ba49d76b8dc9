//! Index Module
//!
//! Metadata tracker for the caching core. The index owns size accounting,
//! expiration, and access recency for every cached key, decides eviction
//! order, and persists its own entry set through the backend it manages via
//! two capabilities supplied at construction: a bulk remove (physical
//! deletes during a sweep) and a non-indexed store (snapshot writes that
//! must not recurse into the index).
//!
//! The index is the sole authority for expiration once loaded; the
//! expiration embedded in an object envelope is only a bootstrap value.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::envelope::{current_timestamp_ms, CacheObject};

// == Reserved Key ==
/// Well-known key the index snapshot is persisted under. Rejected for
/// ordinary store/remove calls so user keys can never collide with it.
pub const INDEX_KEY: &str = "cachecore.index";

/// Boxed future used by the sink capabilities.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// == Index Sink ==
/// Capabilities the index needs from its owner to act on the backend.
///
/// Supplied at construction to avoid a circular ownership dependency
/// between the index and the façade that hosts it.
pub trait IndexSink: Send + Sync + 'static {
    /// Physically deletes `keys` from the backend, taking each key's
    /// exclusive lock like any other writer. Does not touch index
    /// metadata; the sweep that requested the deletes drops the entries
    /// itself.
    fn bulk_remove(&self, keys: Vec<String>) -> BoxFuture<()>;

    /// Writes `data` under `key` without updating the index, so that
    /// persisting the index never triggers an index update of its own.
    fn store_unindexed(&self, key: String, data: Vec<u8>) -> BoxFuture<()>;
}

// == Index Entry ==
/// Per-key metadata, kept separate from the object's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Key the entry describes
    pub key: String,
    /// Byte length of the stored value, for capacity accounting
    pub size: u64,
    /// Absolute expiration timestamp (Unix milliseconds), 0 = none
    pub expiration_ms: u64,
    /// Last read or write (Unix milliseconds), approximates recency
    pub last_access_ms: u64,
}

/// Entry set plus the running total of tracked value bytes.
#[derive(Default)]
struct State {
    entries: HashMap<String, IndexEntry>,
    cache_size: u64,
}

// == Index ==
/// Tracks metadata for every cached key and computes reap victims.
///
/// The state mutex is held only for metadata transactions, never across
/// backend I/O or an await point; many callers touching disjoint keys
/// contend only on these short critical sections.
pub struct Index {
    name: String,
    config: IndexConfig,
    state: Mutex<State>,
    dirty: AtomicBool,
    sink: Arc<dyn IndexSink>,
}

impl Index {
    // == Constructor ==
    /// Builds the index from a previously persisted snapshot, if any.
    ///
    /// A missing or unparsable snapshot starts an empty index with a
    /// warning; index load is crash-tolerant and never fails startup.
    pub fn new(
        name: &str,
        snapshot: Option<&[u8]>,
        config: IndexConfig,
        sink: Arc<dyn IndexSink>,
    ) -> Self {
        let mut state = State::default();
        if let Some(bytes) = snapshot {
            match serde_json::from_slice::<HashMap<String, IndexEntry>>(bytes) {
                Ok(entries) => {
                    state.cache_size = entries.values().map(|e| e.size).sum();
                    state.entries = entries;
                    info!(
                        cache = name,
                        entries = state.entries.len(),
                        bytes = state.cache_size,
                        "cache index loaded from snapshot"
                    );
                }
                Err(e) => {
                    warn!(cache = name, error = %e, "cache index snapshot unreadable, starting empty");
                }
            }
        } else {
            debug!(cache = name, "no cache index snapshot, starting empty");
        }

        Self {
            name: name.to_string(),
            config,
            state: Mutex::new(state),
            dirty: AtomicBool::new(false),
            sink,
        }
    }

    // == Update Object ==
    /// Upserts the entry for a freshly stored object: size from the value
    /// length, expiration from the object, last access now.
    pub fn update_object(&self, object: &CacheObject) {
        if object.key == INDEX_KEY {
            return;
        }
        let size = object.value.len() as u64;
        let mut state = self.lock_state();
        let previous = state.entries.insert(
            object.key.clone(),
            IndexEntry {
                key: object.key.clone(),
                size,
                expiration_ms: object.expiration_ms,
                last_access_ms: current_timestamp_ms(),
            },
        );
        state.cache_size = state.cache_size + size - previous.map_or(0, |e| e.size);
        drop(state);
        self.dirty.store(true, Ordering::Release);
    }

    // == Update Access Time ==
    /// Bumps the entry's last access to now. No-op for an absent key;
    /// runs off the read critical path, so a lagging bump only affects
    /// recency, never correctness.
    pub fn update_object_access_time(&self, key: &str) {
        let mut state = self.lock_state();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.last_access_ms = current_timestamp_ms();
            drop(state);
            self.dirty.store(true, Ordering::Release);
        }
    }

    // == Update TTL ==
    /// Recomputes the entry's expiration as now + `ttl`. A key with no
    /// entry is a no-op, not an error; the update may race with eviction.
    pub fn update_object_ttl(&self, key: &str, ttl: Duration) {
        let mut state = self.lock_state();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.expiration_ms = current_timestamp_ms() + ttl.as_millis() as u64;
            drop(state);
            self.dirty.store(true, Ordering::Release);
        }
    }

    // == Get Expiration ==
    /// Returns the entry's expiration, or 0 when there is no entry.
    /// Callers treat 0 as "not authoritative", not "never expires".
    pub fn get_expiration(&self, key: &str) -> u64 {
        self.lock_state()
            .entries
            .get(key)
            .map_or(0, |e| e.expiration_ms)
    }

    // == Remove Object ==
    /// Drops the entry for `key`. Metadata only; the physical delete is
    /// the façade's job, sequenced under the same named lock.
    pub fn remove_object(&self, key: &str) {
        let mut state = self.lock_state();
        if let Some(entry) = state.entries.remove(key) {
            state.cache_size -= entry.size;
            drop(state);
            self.dirty.store(true, Ordering::Release);
        }
    }

    // == Remove Objects ==
    /// Drops entries for every key in `keys` in one metadata transaction.
    /// Used by the reaper after its physical deletes complete.
    pub fn remove_objects(&self, keys: &[String]) {
        let mut state = self.lock_state();
        let mut removed = false;
        for key in keys {
            if let Some(entry) = state.entries.remove(key) {
                state.cache_size -= entry.size;
                removed = true;
            }
        }
        drop(state);
        if removed {
            self.dirty.store(true, Ordering::Release);
        }
    }

    // == Accessors ==
    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    /// True when no entry is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total tracked value bytes.
    pub fn cache_size(&self) -> u64 {
        self.lock_state().cache_size
    }

    // == Snapshot ==
    /// Serializes the full entry set for persistence under [`INDEX_KEY`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let state = self.lock_state();
        serde_json::to_vec(&state.entries).expect("index entries serialize")
    }

    // == Reap Cycle ==
    /// One background sweep: collect expired keys plus, when the tracked
    /// size exceeds the high watermark, least-recently-accessed keys until
    /// the size falls to the low watermark; physically delete them through
    /// the sink; then drop their entries.
    ///
    /// The victim set is computed under a brief metadata lock that is
    /// released before any backend I/O. The physical deletes take each
    /// victim's exclusive lock inside the sink, so a racing store on the
    /// same key is serialized like any other writer.
    pub async fn reap_cycle(&self) {
        let victims = self.victims(current_timestamp_ms());
        if victims.is_empty() {
            debug!(cache = %self.name, "cache reaper sweep found nothing to remove");
            return;
        }

        info!(
            cache = %self.name,
            victims = victims.len(),
            "cache reaper removing expired or over-capacity entries"
        );
        self.sink.bulk_remove(victims.clone()).await;
        self.remove_objects(&victims);
    }

    // == Flush Cycle ==
    /// Persists the entry set through the non-indexed store if any
    /// metadata changed since the last flush. Best-effort: a failed write
    /// is the sink's to log, and the dirty data is retried next cycle.
    pub async fn flush_cycle(&self) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let bytes = self.to_bytes();
        debug!(cache = %self.name, bytes = bytes.len(), "flushing cache index snapshot");
        self.sink
            .store_unindexed(INDEX_KEY.to_string(), bytes)
            .await;
    }

    /// Computes the reap victim set at `now_ms`.
    ///
    /// Among equally old entries, ties break by key ordering so a given
    /// entry set always yields the same victim list.
    fn victims(&self, now_ms: u64) -> Vec<String> {
        let state = self.lock_state();

        let mut victims: Vec<String> = Vec::new();
        let mut survivors: Vec<(u64, &str, u64)> = Vec::new();
        let mut remaining_size = state.cache_size;

        for entry in state.entries.values() {
            if entry.expiration_ms != 0 && entry.expiration_ms <= now_ms {
                victims.push(entry.key.clone());
                remaining_size -= entry.size;
            } else {
                survivors.push((entry.last_access_ms, entry.key.as_str(), entry.size));
            }
        }
        victims.sort();

        if remaining_size > self.config.max_size_bytes {
            survivors.sort();
            for (_, key, size) in survivors {
                if remaining_size <= self.config.size_low_watermark_bytes {
                    break;
                }
                victims.push(key.to_string());
                remaining_size -= size;
            }
        }

        victims
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("index state poisoned")
    }
}
