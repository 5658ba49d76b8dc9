//! Integration tests for the caching core
//!
//! Exercises the full façade end to end over both backends: round trips,
//! expiration, corruption handling, lock isolation, bulk removal, capacity
//! eviction, and index persistence across a simulated restart.

use std::fs;
use std::sync::Once;
use std::time::Duration;

use tempfile::TempDir;

use cachecore::{
    BackendStore, Cache, CacheConfig, CacheError, FilesystemBackend, IndexConfig, LookupStatus,
    MemoryBackend,
};

static INIT_TRACING: Once = Once::new();

fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "cachecore=warn".into()),
            )
            .try_init();
    });
}

fn quick_sweep_config(name: &str) -> CacheConfig {
    CacheConfig {
        name: name.to_string(),
        index: IndexConfig {
            sweep_interval: Duration::from_millis(100),
            flush_interval: Duration::from_millis(100),
            ..IndexConfig::default()
        },
        ..CacheConfig::default()
    }
}

// == Round Trip ==

#[tokio::test]
async fn test_filesystem_roundtrip_binary_value() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cache = Cache::new(
        quick_sweep_config("fs-roundtrip"),
        FilesystemBackend::new(dir.path()),
    );
    cache.connect().await.unwrap();

    let value: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    cache
        .store("binary", value.clone(), Duration::from_secs(60))
        .await
        .unwrap();

    let lookup = cache.retrieve("binary", false).await.unwrap();
    assert_eq!(lookup.status(), LookupStatus::Hit);
    assert_eq!(lookup.into_value().unwrap(), value);

    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_roundtrip_empty_value() {
    init_tracing();
    let cache = Cache::new(quick_sweep_config("empty-value"), MemoryBackend::new());
    cache.connect().await.unwrap();

    cache
        .store("empty", Vec::new(), Duration::from_secs(60))
        .await
        .unwrap();

    let lookup = cache.retrieve("empty", false).await.unwrap();
    assert_eq!(lookup.status(), LookupStatus::Hit);
    assert_eq!(lookup.into_value().unwrap(), Vec::<u8>::new());

    cache.close().await.unwrap();
}

// == Expiration ==

#[tokio::test]
async fn test_expired_entry_miss_and_allow_expired_hit() {
    init_tracing();
    let cache = Cache::new(quick_sweep_config("expiry"), MemoryBackend::new());
    cache.connect().await.unwrap();

    cache
        .store("short", b"payload".to_vec(), Duration::from_millis(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Physically still present until reaped; allow_expired sees it
    let allowed = cache.retrieve("short", true).await.unwrap();
    assert_eq!(allowed.status(), LookupStatus::Hit);
    assert_eq!(allowed.into_value().unwrap(), b"payload");

    let denied = cache.retrieve("short", false).await.unwrap();
    assert_eq!(denied.status(), LookupStatus::KeyMiss);

    cache.close().await.unwrap();
}

// == Invalid Input ==

#[tokio::test]
async fn test_invalid_arguments_perform_no_io() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(dir.path());
    let cache = Cache::new(quick_sweep_config("invalid"), backend.clone());
    cache.connect().await.unwrap();

    assert!(matches!(
        cache.store("", b"v".to_vec(), Duration::from_secs(1)).await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        cache.store("k", b"v".to_vec(), Duration::ZERO).await,
        Err(CacheError::InvalidArgument(_))
    ));

    // No data files were written
    assert!(!backend.data_file("").exists());
    assert!(!backend.data_file("k").exists());

    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_fails_on_unwritable_location() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("taken");
    fs::write(&blocker, b"").unwrap();

    let cache = Cache::new(
        quick_sweep_config("unwritable"),
        FilesystemBackend::new(&blocker),
    );
    assert!(matches!(
        cache.connect().await,
        Err(CacheError::NotWritable(_))
    ));
}

// == Corruption ==

#[tokio::test]
async fn test_corrupt_file_yields_error_status_not_miss() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(dir.path());
    let cache = Cache::new(quick_sweep_config("corrupt"), backend.clone());
    cache.connect().await.unwrap();

    cache
        .store("victim", b"good".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    // Corrupt the stored bytes behind the cache's back
    fs::write(backend.data_file("victim"), b"\xde\xad\xbe\xef").unwrap();

    let err = cache.retrieve("victim", false).await.unwrap_err();
    assert!(matches!(err, CacheError::Decode(_)));
    assert_eq!(err.lookup_status(), LookupStatus::Error);

    // The read path never auto-deletes a corrupt entry
    assert!(backend.data_file("victim").exists());

    cache.close().await.unwrap();
}

// == Lock Isolation ==

#[tokio::test]
async fn test_concurrent_stores_on_distinct_keys_complete() {
    init_tracing();
    let cache = Cache::new(quick_sweep_config("distinct-keys"), MemoryBackend::new());
    cache.connect().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..100 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache
                .store(
                    &format!("key-{}", i),
                    vec![i as u8; 64],
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
        }));
    }

    let all = async {
        for handle in handles {
            handle.await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(5), all)
        .await
        .expect("distinct-key stores must not serialize behind each other");

    for i in 0..100 {
        let lookup = cache.retrieve(&format!("key-{}", i), false).await.unwrap();
        assert_eq!(lookup.status(), LookupStatus::Hit);
    }

    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_same_key_readers_never_observe_partial_objects() {
    init_tracing();
    let cache = Cache::new(quick_sweep_config("same-key"), MemoryBackend::new());
    cache.connect().await.unwrap();

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..200u32 {
                let fill = if i % 2 == 0 { 0xAAu8 } else { 0xBBu8 };
                cache
                    .store("contended", vec![fill; 1024], Duration::from_secs(60))
                    .await
                    .unwrap();
            }
        })
    };

    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                if let Some(value) = cache
                    .retrieve("contended", false)
                    .await
                    .unwrap()
                    .into_value()
                {
                    assert_eq!(value.len(), 1024, "torn write observed");
                    assert!(
                        value.iter().all(|&b| b == value[0]),
                        "mixed write observed"
                    );
                }
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    cache.close().await.unwrap();
}

// == Bulk Removal ==

#[tokio::test]
async fn test_bulk_remove_clears_backend_and_index() {
    init_tracing();
    let backend = MemoryBackend::new();
    let cache = Cache::new(quick_sweep_config("bulk"), backend.clone());
    cache.connect().await.unwrap();

    let keys: Vec<String> = (0..10).map(|i| format!("bulk-{}", i)).collect();
    for key in &keys {
        cache
            .store(key, b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
    }

    let mut to_remove = keys.clone();
    to_remove.push("never-existed".to_string());
    cache.bulk_remove(to_remove).await;

    for key in &keys {
        assert!(matches!(
            backend.retrieve(key),
            Err(CacheError::NotFound(_))
        ));
    }

    cache.close().await.unwrap();
}

// == Capacity Eviction ==

#[tokio::test]
async fn test_capacity_eviction_spares_recently_accessed() {
    init_tracing();
    let config = CacheConfig {
        name: "capacity".to_string(),
        index: IndexConfig {
            sweep_interval: Duration::from_millis(100),
            flush_interval: Duration::from_secs(60),
            max_size_bytes: 100,
            size_low_watermark_bytes: 64,
        },
        ..CacheConfig::default()
    };
    let cache = Cache::new(config, MemoryBackend::new());
    cache.connect().await.unwrap();

    for key in ["a", "b", "c", "d"] {
        cache
            .store(key, vec![0u8; 40], Duration::from_secs(3600))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Touch "a" so it is the most recently accessed entry
    let lookup = cache.retrieve("a", false).await.unwrap();
    assert_eq!(lookup.status(), LookupStatus::Hit);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // 160 tracked bytes > 100; the sweep evicts oldest-access entries
    // (b, c, d) until 40 <= 64 remain
    tokio::time::sleep(Duration::from_millis(300)).await;

    let index = cache.index().unwrap();
    assert!(
        index.cache_size() <= 64,
        "tracked size {} above low watermark",
        index.cache_size()
    );

    let survivor = cache.retrieve("a", false).await.unwrap();
    assert_eq!(
        survivor.status(),
        LookupStatus::Hit,
        "recently accessed entry must not be evicted"
    );
    for key in ["b", "c", "d"] {
        let lookup = cache.retrieve(key, false).await.unwrap();
        assert_eq!(lookup.status(), LookupStatus::KeyMiss, "{} not evicted", key);
    }

    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_reaper_physically_removes_expired_entries() {
    init_tracing();
    let backend = MemoryBackend::new();
    let cache = Cache::new(quick_sweep_config("reap"), backend.clone());
    cache.connect().await.unwrap();

    cache
        .store("doomed", b"v".to_vec(), Duration::from_millis(10))
        .await
        .unwrap();
    cache
        .store("kept", b"v".to_vec(), Duration::from_secs(3600))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(matches!(
        backend.retrieve("doomed"),
        Err(CacheError::NotFound(_))
    ));
    assert!(backend.retrieve("kept").is_ok());
    assert_eq!(cache.index().unwrap().get_expiration("doomed"), 0);

    cache.close().await.unwrap();
}

// == Persistence ==

#[tokio::test]
async fn test_index_survives_restart() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let first = Cache::new(
        quick_sweep_config("restart"),
        FilesystemBackend::new(dir.path()),
    );
    first.connect().await.unwrap();

    first
        .store("k1", b"one".to_vec(), Duration::from_secs(3600))
        .await
        .unwrap();
    first
        .store("k2", b"two".to_vec(), Duration::from_secs(7200))
        .await
        .unwrap();

    let index = first.index().unwrap();
    let exp1 = index.get_expiration("k1");
    let exp2 = index.get_expiration("k2");
    assert!(exp1 > 0 && exp2 > 0);

    // close() flushes the dirty index snapshot before stopping
    first.close().await.unwrap();

    let second = Cache::new(
        quick_sweep_config("restart"),
        FilesystemBackend::new(dir.path()),
    );
    second.connect().await.unwrap();

    let reloaded = second.index().unwrap();
    assert_eq!(reloaded.get_expiration("k1"), exp1);
    assert_eq!(reloaded.get_expiration("k2"), exp2);

    // Values are still readable through the new instance
    let lookup = second.retrieve("k1", false).await.unwrap();
    assert_eq!(lookup.into_value().unwrap(), b"one");

    second.close().await.unwrap();
}
