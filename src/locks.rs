//! Named Locker Module
//!
//! Issues exclusive and shared locks keyed by string name, so operations on
//! the same cache key are serialized without a global lock. Locks are created
//! lazily on first acquisition and reclaimed once the holder count returns to
//! zero, bounding memory under a large, churning key space.
//!
//! Recursive acquisition of the same name by the same task is a caller
//! contract violation and will deadlock; it is not detected internally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

// == Registry ==
/// One live named lock and the number of tasks holding or awaiting it.
struct Slot {
    lock: Arc<RwLock<()>>,
    holders: usize,
}

type Registry = Mutex<HashMap<String, Slot>>;

// == Named Locker ==
/// Registry of per-name read/write locks with holder reference counting.
///
/// Waiters are counted as holders from the moment they check a slot out, so
/// a slot is never reclaimed while a task is still blocked on it and a fresh
/// acquisition after reclamation transparently recreates it.
#[derive(Default)]
pub struct NamedLocker {
    slots: Arc<Registry>,
}

impl NamedLocker {
    // == Constructor ==
    /// Creates a new locker with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire (exclusive) ==
    /// Acquires the exclusive lock for `name`, blocking the calling task
    /// until no other exclusive or shared holder remains.
    ///
    /// The lease releases on [`WriteLease::release`] or on drop; every exit
    /// path therefore releases exactly once.
    pub async fn acquire(&self, name: &str) -> WriteLease {
        let (lock, claim) = self.checkout(name);
        let guard = lock.write_owned().await;
        WriteLease {
            _guard: guard,
            _claim: claim,
        }
    }

    // == RAcquire (shared) ==
    /// Acquires a shared lock for `name`, blocking only while an exclusive
    /// lock on the same name is held. Multiple shared holders proceed
    /// concurrently.
    pub async fn racquire(&self, name: &str) -> ReadLease {
        let (lock, claim) = self.checkout(name);
        let guard = lock.read_owned().await;
        ReadLease {
            _guard: guard,
            _claim: claim,
        }
    }

    // == Live Slot Count ==
    /// Returns the number of names with at least one holder or waiter.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("lock registry poisoned").len()
    }

    /// Returns true if no named lock is currently held or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks a name's lock out of the registry, creating the slot on first
    /// use and counting the caller as a holder before it starts waiting.
    ///
    /// The returned claim checks back in on drop, so a caller whose wait is
    /// cancelled mid-acquisition still gives its count back.
    fn checkout(&self, name: &str) -> (Arc<RwLock<()>>, Claim) {
        let mut slots = self.slots.lock().expect("lock registry poisoned");
        let slot = slots.entry(name.to_string()).or_insert_with(|| Slot {
            lock: Arc::new(RwLock::new(())),
            holders: 0,
        });
        slot.holders += 1;
        let lock = Arc::clone(&slot.lock);
        drop(slots);
        (
            lock,
            Claim {
                name: name.to_string(),
                slots: Arc::clone(&self.slots),
            },
        )
    }
}

// == Claim ==
/// One holder's registration in the registry. Dropping it decrements the
/// holder count and removes the slot at zero, whether the holder finished
/// with its lease or was cancelled while still waiting for the rwlock.
struct Claim {
    name: String,
    slots: Arc<Registry>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().expect("lock registry poisoned");
        if let Some(slot) = slots.get_mut(&self.name) {
            slot.holders -= 1;
            if slot.holders == 0 {
                slots.remove(&self.name);
            }
        }
    }
}

// == Write Lease ==
/// Exclusive lease on a named lock.
///
/// Field order matters: the rwlock guard must unlock before the claim gives
/// the holder count back, otherwise a recreated slot could hand out a second
/// exclusive lock while this one is still held.
pub struct WriteLease {
    _guard: OwnedRwLockWriteGuard<()>,
    _claim: Claim,
}

impl WriteLease {
    /// Releases the exclusive lock.
    pub fn release(self) {}
}

// == Read Lease ==
/// Shared lease on a named lock.
pub struct ReadLease {
    _guard: OwnedRwLockReadGuard<()>,
    _claim: Claim,
}

impl ReadLease {
    /// Releases the shared lock.
    pub fn rrelease(self) {}
}
