//! Backend Store Module
//!
//! The storage seam of the caching core: raw byte read/write adapters the
//! façade drives. Backends know nothing about envelopes, locks, or the
//! index; each operation is atomic per key and no cross-key atomicity is
//! assumed.

mod filesystem;
mod memory;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;

use crate::error::Result;

// == Backend Store Contract ==
/// Raw key/value byte I/O for one storage medium.
///
/// All I/O is synchronous from the façade's point of view: a call blocks
/// the calling task until the medium acknowledges it. A missing key on
/// [`BackendStore::retrieve`] must surface as [`crate::CacheError::NotFound`]
/// so callers can tell a miss from a broken read.
pub trait BackendStore: Send + Sync + 'static {
    /// Prepares and validates the storage medium. Called once by the
    /// façade's `connect`; a location that fails its writability probe
    /// returns [`crate::CacheError::NotWritable`] and aborts startup.
    fn connect(&self) -> Result<()>;

    /// Writes `data` under `key`, replacing any previous bytes.
    fn store(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Reads the bytes stored under `key`.
    fn retrieve(&self, key: &str) -> Result<Vec<u8>>;

    /// Deletes `key`. Removing an absent key is a silent no-op.
    fn remove(&self, key: &str) -> Result<()>;

    /// Releases backend resources. Idempotent; a no-op for stateless media.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
