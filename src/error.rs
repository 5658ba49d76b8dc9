//! Error types for the caching core
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::status::LookupStatus;

// == Cache Error Enum ==
/// Unified error type for the caching core.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected before any I/O: empty key, reserved key, non-positive TTL
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Key not present in the backend store
    #[error("key not found: {0}")]
    NotFound(String),

    /// Read/write/delete failure from the storage medium
    #[error("backend i/o failure: {0}")]
    BackendIo(#[from] std::io::Error),

    /// Stored bytes could not be deserialized into an object
    #[error("value could not be deserialized from cache: {0}")]
    Decode(String),

    /// Backend location failed the writability probe at connect time
    #[error("cache location is not writable: {0}")]
    NotWritable(String),
}

impl CacheError {
    // == Lookup Status Mapping ==
    /// Maps the error to the lookup status a retrieval would report.
    ///
    /// A missing key is a `KeyMiss`; everything else (corrupt bytes,
    /// backend failures) is an `Error` and must never be conflated
    /// with a miss.
    pub fn lookup_status(&self) -> LookupStatus {
        match self {
            CacheError::NotFound(_) => LookupStatus::KeyMiss,
            _ => LookupStatus::Error,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching core.
pub type Result<T> = std::result::Result<T, CacheError>;
