//! Lookup Status Module
//!
//! Describes the outcome of a cache retrieval.

use serde::Serialize;

// == Lookup Status ==
/// Outcome of a cache lookup.
///
/// `KeyMiss` (absent or lazily expired) and `Error` (corrupt bytes or a
/// failing backend) are distinct outcomes and are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookupStatus {
    /// The object was found and is usable
    Hit,
    /// The key is not present, or present but expired
    KeyMiss,
    /// The lookup failed for a reason other than absence
    Error,
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LookupStatus::Hit => "hit",
            LookupStatus::KeyMiss => "kmiss",
            LookupStatus::Error => "error",
        };
        f.write_str(s)
    }
}
