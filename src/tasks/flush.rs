//! Index Flush Task
//!
//! Background task that periodically persists the index snapshot through
//! the non-indexed store, so metadata survives a process restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::index::Index;

/// Spawns the recurring snapshot flush for `index`.
///
/// Each cycle writes the serialized entry set under the reserved index key
/// only if metadata changed since the previous flush.
///
/// # Returns
/// A JoinHandle used to abort the task on `close`.
pub fn spawn_flush_task(index: Arc<Index>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting cache index flush task");

        loop {
            tokio::time::sleep(interval).await;
            index.flush_cycle().await;
        }
    })
}
