//! Object Envelope Module
//!
//! Defines the serialized form of one cache record and its binary codec.
//! Every backend stores and returns envelopes produced here, so the layout
//! must round-trip arbitrary byte values without loss.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CacheError, Result};

/// First byte of every encoded envelope.
const ENVELOPE_MAGIC: u8 = 0xC6;

/// Envelope layout version.
const ENVELOPE_VERSION: u8 = 1;

/// Fixed bytes before the key: magic, version, key length (u32).
const HEADER_LEN: usize = 2 + 4;

// == Cache Object ==
/// One cached record: key, opaque value bytes, and the expiration the
/// object carried when it was written.
///
/// `expiration_ms == 0` means no expiration is enforced at this layer;
/// once the index is loaded it is the sole authority for expiration and
/// the embedded value is only a bootstrap fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheObject {
    /// Key the object is stored under, unique within a cache instance
    pub key: String,
    /// Caller-supplied value bytes, arbitrary length and content
    pub value: Vec<u8>,
    /// Absolute expiration timestamp (Unix milliseconds), 0 = unset
    pub expiration_ms: u64,
}

impl CacheObject {
    // == Constructor ==
    /// Creates an object expiring `ttl` from now.
    pub fn new(key: &str, value: Vec<u8>, ttl: std::time::Duration) -> Self {
        Self {
            key: key.to_string(),
            value,
            expiration_ms: current_timestamp_ms() + ttl.as_millis() as u64,
        }
    }

    // == Encode ==
    /// Serializes the object into a self-describing byte buffer.
    ///
    /// Layout: magic (1) | version (1) | key length (u32 LE) | key bytes |
    /// expiration millis (u64 LE) | value length (u64 LE) | value bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let key = self.key.as_bytes();
        let mut buf = Vec::with_capacity(HEADER_LEN + key.len() + 16 + self.value.len());
        buf.push(ENVELOPE_MAGIC);
        buf.push(ENVELOPE_VERSION);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(&self.expiration_ms.to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf
    }

    // == Decode ==
    /// Deserializes an object from `buf`.
    ///
    /// Fails with [`CacheError::Decode`] on a truncated buffer, a
    /// magic/version mismatch, a length prefix that overruns the buffer,
    /// or trailing bytes. A decode failure is a cache error, never a miss.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CacheError::Decode(format!(
                "buffer too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0] != ENVELOPE_MAGIC {
            return Err(CacheError::Decode(format!("bad magic byte: {:#04x}", buf[0])));
        }
        if buf[1] != ENVELOPE_VERSION {
            return Err(CacheError::Decode(format!(
                "unsupported envelope version: {}",
                buf[1]
            )));
        }

        let key_len = u32::from_le_bytes(buf[2..6].try_into().unwrap()) as usize;
        let mut pos = HEADER_LEN;
        let key_end = pos
            .checked_add(key_len)
            .filter(|&end| end + 16 <= buf.len())
            .ok_or_else(|| CacheError::Decode(format!("bad key length prefix: {}", key_len)))?;
        let key = std::str::from_utf8(&buf[pos..key_end])
            .map_err(|e| CacheError::Decode(format!("key is not valid utf-8: {}", e)))?
            .to_string();
        pos = key_end;

        let expiration_ms = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let value_len = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()) as usize;
        pos += 8;

        if buf.len() - pos != value_len {
            return Err(CacheError::Decode(format!(
                "value length prefix {} does not match {} remaining bytes",
                value_len,
                buf.len() - pos
            )));
        }

        Ok(Self {
            key,
            value: buf[pos..].to_vec(),
            expiration_ms,
        })
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
