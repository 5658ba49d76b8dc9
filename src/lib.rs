//! cachecore - the storage-agnostic caching core of a reverse-proxy cache
//!
//! A key/value store with per-object TTL, size- and age-based eviction, and
//! crash-tolerant persistence of its own metadata. Raw byte storage is
//! pluggable behind [`backend::BackendStore`]; the [`index::Index`] tracks
//! expiration and recency, reaps stale and over-capacity entries in the
//! background, and persists itself through the very backend it manages.

pub mod backend;
pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod index;
pub mod locks;
pub mod metrics;
pub mod status;
pub mod tasks;

pub use backend::{BackendStore, FilesystemBackend, MemoryBackend};
pub use cache::{Cache, Lookup};
pub use config::{CacheConfig, IndexConfig};
pub use envelope::CacheObject;
pub use error::{CacheError, Result};
pub use index::{Index, IndexEntry, INDEX_KEY};
pub use locks::NamedLocker;
pub use metrics::{CacheObserver, NoopObserver};
pub use status::LookupStatus;
