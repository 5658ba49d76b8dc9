//! Reaper Task
//!
//! Background task that periodically sweeps the index, removing expired
//! entries and, when the tracked size exceeds capacity, the least recently
//! accessed entries until the low watermark is reached.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::index::Index;

/// Spawns the recurring reaper sweep for `index`.
///
/// The task sleeps for `interval` between sweeps. Victim selection happens
/// under a brief metadata lock inside the index; physical deletion runs
/// through the index's sink afterward, under each victim key's exclusive
/// lock.
///
/// # Returns
/// A JoinHandle used to abort the task on `close`; no sweep may be left
/// running after shutdown.
pub fn spawn_reaper_task(index: Arc<Index>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting cache reaper task");

        loop {
            tokio::time::sleep(interval).await;
            index.reap_cycle().await;
        }
    })
}
