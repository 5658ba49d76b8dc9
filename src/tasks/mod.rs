//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a connected
//! cache instance.
//!
//! # Tasks
//! - Reaper: expires and evicts entries at configured intervals
//! - Flush: persists the index snapshot when metadata changed

mod flush;
mod reaper;

pub use flush::spawn_flush_task;
pub use reaper::spawn_reaper_task;
