//! Cache Façade Module
//!
//! Public API of the caching core. Sequences named-lock acquisition,
//! backend byte I/O, envelope encoding/decoding, and index updates, and
//! owns the index bootstrap: `connect` performs one raw read of the
//! reserved index key before the index exists, then routes every later
//! decision through it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::backend::BackendStore;
use crate::config::CacheConfig;
use crate::envelope::{current_timestamp_ms, CacheObject};
use crate::error::{CacheError, Result};
use crate::index::{BoxFuture, Index, IndexSink, INDEX_KEY};
use crate::locks::NamedLocker;
use crate::metrics::{CacheObserver, NoopObserver};
use crate::status::LookupStatus;
use crate::tasks::{spawn_flush_task, spawn_reaper_task};

/// TTL applied to non-indexed writes (the index snapshot itself).
const UNINDEXED_TTL: Duration = Duration::from_secs(31_536_000);

// == Lookup Outcome ==
/// Successful outcome of a retrieval.
///
/// Errors (corrupt bytes, failing backend) travel separately as
/// [`CacheError`]; their status is [`CacheError::lookup_status`].
#[derive(Debug)]
pub enum Lookup {
    /// The object was found and is usable
    Hit(Vec<u8>),
    /// The key is absent, or present but expired
    Miss,
}

impl Lookup {
    /// The status this outcome reports.
    pub fn status(&self) -> LookupStatus {
        match self {
            Lookup::Hit(_) => LookupStatus::Hit,
            Lookup::Miss => LookupStatus::KeyMiss,
        }
    }

    /// The value for a hit, or None for a miss.
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }
}

// == Index Phase ==
/// Bootstrap state of the index.
///
/// While not `Ready`, reads fall back to the expiration embedded in each
/// object envelope and metadata updates are skipped; the index becomes the
/// sole authority once loaded.
enum IndexPhase {
    Unloaded,
    Loading,
    Ready(Arc<Index>),
}

// == Cache Façade ==
/// A cache instance over one backend store.
///
/// Cheap to clone; clones share the same backend, locker, and index.
pub struct Cache<B: BackendStore> {
    inner: Arc<CacheInner<B>>,
}

impl<B: BackendStore> Clone for Cache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<B: BackendStore> {
    name: String,
    config: CacheConfig,
    backend: B,
    locker: NamedLocker,
    observer: Arc<dyn CacheObserver>,
    phase: RwLock<IndexPhase>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<B: BackendStore> Cache<B> {
    // == Constructor ==
    /// Creates an unconnected cache over `backend`. No I/O happens until
    /// [`Cache::connect`].
    pub fn new(config: CacheConfig, backend: B) -> Self {
        Self::with_observer(config, backend, Arc::new(NoopObserver))
    }

    /// Like [`Cache::new`] with an explicit metrics observer.
    pub fn with_observer(
        config: CacheConfig,
        backend: B,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name: config.name.clone(),
                config,
                backend,
                locker: NamedLocker::new(),
                observer,
                phase: RwLock::new(IndexPhase::Unloaded),
                tasks: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Cache instance name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The index, once `connect` has loaded it.
    pub fn index(&self) -> Option<Arc<Index>> {
        self.inner.index()
    }

    // == Connect ==
    /// Prepares the backend and bootstraps the index.
    ///
    /// The backend's writability probe runs first; a location that fails
    /// it aborts startup with [`CacheError::NotWritable`]. The persisted
    /// snapshot is then read through one raw retrieval of the reserved
    /// index key (no index exists yet to consult), the index is built from
    /// it, and the reaper and flush tasks are started. A missing or
    /// unreadable snapshot starts an empty index and is never fatal.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        info!(cache = %inner.name, "cache setup");
        inner.backend.connect()?;

        *inner.phase.write().expect("index phase poisoned") = IndexPhase::Loading;

        let snapshot = match CacheInner::retrieve_inner(inner, INDEX_KEY, true, false).await {
            Ok(Lookup::Hit(bytes)) => Some(bytes),
            Ok(Lookup::Miss) => None,
            Err(e) => {
                warn!(cache = %inner.name, error = %e, "persisted cache index unreadable");
                None
            }
        };

        let sink = Arc::new(CacheSink {
            inner: Arc::downgrade(inner),
        });
        let index = Arc::new(Index::new(
            &inner.name,
            snapshot.as_deref(),
            inner.config.index.clone(),
            sink,
        ));

        *inner.phase.write().expect("index phase poisoned") = IndexPhase::Ready(Arc::clone(&index));

        let mut tasks = inner.tasks.lock().expect("task list poisoned");
        tasks.push(spawn_reaper_task(
            Arc::clone(&index),
            inner.config.index.sweep_interval,
        ));
        tasks.push(spawn_flush_task(index, inner.config.index.flush_interval));
        Ok(())
    }

    // == Store ==
    /// Places `value` in the cache under `key` for `ttl`.
    ///
    /// Fails with [`CacheError::InvalidArgument`] before any I/O for an
    /// empty or reserved key or a zero TTL. Holds `key`'s exclusive lock
    /// across the backend write and the index update.
    pub async fn store(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        validate_key(key)?;
        if ttl.is_zero() {
            return Err(CacheError::InvalidArgument(format!(
                "invalid ttl: {}ms",
                ttl.as_millis()
            )));
        }
        self.inner.store_inner(key, value, ttl, true).await
    }

    // == Retrieve ==
    /// Looks `key` up and returns its value on a hit.
    ///
    /// The index is authoritative for expiration once loaded; before that
    /// (bootstrap window) the envelope's own expiration applies. An
    /// expired entry with `allow_expired == false` reports a miss and is
    /// removed asynchronously off the read path, through the same locked
    /// path as an ordinary remove. A decode failure is an error, never a
    /// miss.
    pub async fn retrieve(&self, key: &str, allow_expired: bool) -> Result<Lookup> {
        CacheInner::retrieve_inner(&self.inner, key, allow_expired, true).await
    }

    // == Set TTL ==
    /// Resets `key`'s expiration to now + `ttl`.
    ///
    /// Delegates to the index asynchronously and does not rewrite the
    /// stored value. A key with no index entry is a silent no-op (the
    /// update may race with eviction).
    pub fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        validate_key(key)?;
        if let Some(index) = self.inner.index() {
            let key = key.to_string();
            tokio::spawn(async move { index.update_object_ttl(&key, ttl) });
        }
        Ok(())
    }

    // == Remove ==
    /// Deletes `key` from the backend under its exclusive lock; the index
    /// entry is dropped asynchronously afterward.
    pub async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        CacheInner::remove_inner(&self.inner, key, false).await
    }

    // == Bulk Remove ==
    /// Deletes many keys concurrently, each under its own exclusive lock,
    /// and waits for every delete to finish.
    ///
    /// Per-key index removal is deliberately not triggered here: the
    /// caller (the reaper sweep) drops the corresponding entries itself,
    /// which avoids a second round trip and a callback cycle. A key not
    /// present in the backend is a silent no-op.
    pub async fn bulk_remove(&self, keys: Vec<String>) {
        CacheInner::bulk_remove(&self.inner, keys).await;
    }

    // == Close ==
    /// Stops background tasks and releases backend resources. Idempotent.
    /// A dirty index is flushed best-effort before the tasks stop.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(index) = self.inner.index() {
            index.flush_cycle().await;
        }
        for handle in self
            .inner
            .tasks
            .lock()
            .expect("task list poisoned")
            .drain(..)
        {
            handle.abort();
        }
        info!(cache = %self.inner.name, "cache closed");
        self.inner.backend.close()
    }
}

impl<B: BackendStore> CacheInner<B> {
    /// Instance-scoped lock name for `key`; two cache instances never
    /// share lock state.
    fn lock_name(&self, key: &str) -> String {
        format!("{}.{}", self.name, key)
    }

    fn index(&self) -> Option<Arc<Index>> {
        match &*self.phase.read().expect("index phase poisoned") {
            IndexPhase::Ready(index) => Some(Arc::clone(index)),
            IndexPhase::Unloaded | IndexPhase::Loading => None,
        }
    }

    async fn store_inner(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
        update_index: bool,
    ) -> Result<()> {
        self.observer.observe_operation("set", "none", value.len());

        let object = CacheObject::new(key, value, ttl);
        let data = object.to_bytes();

        let lease = self.locker.acquire(&self.lock_name(key)).await;
        let result = self.backend.store(key, &data);
        match result {
            Ok(()) => {
                if update_index {
                    if let Some(index) = self.index() {
                        index.update_object(&object);
                    }
                }
                lease.release();
                debug!(cache = %self.name, key, bytes = data.len(), indexed = update_index, "cache store");
                Ok(())
            }
            Err(e) => {
                lease.release();
                Err(e)
            }
        }
    }

    /// Snapshot write path: long TTL, no index update, failures logged
    /// rather than propagated (the next flush retries).
    async fn store_unindexed(&self, key: &str, data: Vec<u8>) {
        let size = data.len();
        if let Err(e) = self.store_inner(key, data, UNINDEXED_TTL, false).await {
            error!(cache = %self.name, key, bytes = size, error = %e, "failed to write non-indexed object");
        }
    }

    async fn retrieve_inner(
        this: &Arc<Self>,
        key: &str,
        allow_expired: bool,
        atime: bool,
    ) -> Result<Lookup> {
        let lease = this.locker.racquire(&this.lock_name(key)).await;
        let read = this.backend.retrieve(key);
        lease.rrelease();

        let data = match read {
            Ok(data) => data,
            Err(CacheError::NotFound(_)) => {
                debug!(cache = %this.name, key, "cache miss");
                this.observer.observe_operation("get", "miss", 0);
                return Ok(Lookup::Miss);
            }
            Err(e) => {
                this.observer.observe_operation("get", "error", 0);
                return Err(e);
            }
        };

        let object = match CacheObject::from_bytes(&data) {
            Ok(object) => object,
            Err(e) => {
                warn!(cache = %this.name, key, error = %e, "cache object could not be deserialized");
                this.observer.observe_operation("get", "error", data.len());
                return Err(e);
            }
        };

        // Index expiration is authoritative; 0 means "no entry", in which
        // case the envelope's own value is the (bootstrap) fallback.
        let index = this.index();
        let expiration_ms = index
            .as_ref()
            .map(|index| index.get_expiration(key))
            .filter(|&exp| exp != 0)
            .unwrap_or(object.expiration_ms);

        if allow_expired || expiration_ms == 0 || expiration_ms > current_timestamp_ms() {
            debug!(cache = %this.name, key, "cache retrieve");
            if atime {
                if let Some(index) = index {
                    let key = key.to_string();
                    tokio::spawn(async move { index.update_object_access_time(&key) });
                }
            }
            this.observer.observe_operation("get", "hit", object.value.len());
            return Ok(Lookup::Hit(object.value));
        }

        // Expired but not yet reaped: lazy removal, detached from the
        // read path, serialized against writers by the ordinary locked
        // remove path.
        let inner = Arc::clone(this);
        let stale = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = CacheInner::remove_inner(&inner, &stale, false).await {
                warn!(cache = %inner.name, key = %stale, error = %e, "lazy expiration removal failed");
            }
        });

        this.observer.observe_operation("get", "miss", 0);
        Ok(Lookup::Miss)
    }

    async fn remove_inner(this: &Arc<Self>, key: &str, is_bulk: bool) -> Result<()> {
        let lease = this.locker.acquire(&this.lock_name(key)).await;
        let result = this.backend.remove(key);
        lease.release();
        result?;

        // Bulk callers (the reaper) drop their index entries themselves.
        if !is_bulk {
            if let Some(index) = this.index() {
                let key = key.to_string();
                tokio::spawn(async move { index.remove_object(&key) });
            }
        }
        this.observer.observe_operation("del", "none", 0);
        Ok(())
    }

    async fn bulk_remove(this: &Arc<Self>, keys: Vec<String>) {
        let mut deletes = JoinSet::new();
        for key in keys {
            let inner = Arc::clone(this);
            deletes.spawn(async move {
                if let Err(e) = CacheInner::remove_inner(&inner, &key, true).await {
                    warn!(cache = %inner.name, key, error = %e, "bulk removal failed");
                }
            });
        }
        while deletes.join_next().await.is_some() {}
    }
}

// == Index Sink Binding ==
/// Binds the index's capabilities to a cache instance without owning it;
/// a weak reference keeps the index from pinning the façade alive.
struct CacheSink<B: BackendStore> {
    inner: Weak<CacheInner<B>>,
}

impl<B: BackendStore> IndexSink for CacheSink<B> {
    fn bulk_remove(&self, keys: Vec<String>) -> BoxFuture<()> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(inner) = inner.upgrade() {
                CacheInner::bulk_remove(&inner, keys).await;
            }
        })
    }

    fn store_unindexed(&self, key: String, data: Vec<u8>) -> BoxFuture<()> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(inner) = inner.upgrade() {
                inner.store_unindexed(&key, data).await;
            }
        })
    }
}

/// Rejects empty keys and the reserved index key before any I/O.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument("cache key required".to_string()));
    }
    if key == INDEX_KEY {
        return Err(CacheError::InvalidArgument(format!(
            "cache key {} is reserved",
            INDEX_KEY
        )));
    }
    Ok(())
}
