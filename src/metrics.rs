//! Metrics Boundary Module
//!
//! Observation seam for an external metrics collaborator. Observations are
//! fire-and-forget: they carry the operation kind, the outcome, and the byte
//! size involved, and must never block or fail the calling operation.

// == Cache Observer ==
/// Receives per-operation observations from the façade.
pub trait CacheObserver: Send + Sync + 'static {
    /// Called once per set/get/del with its outcome and byte size.
    fn observe_operation(&self, op: &str, outcome: &str, bytes: usize);
}

// == Noop Observer ==
/// Default observer that discards every observation.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {
    fn observe_operation(&self, _op: &str, _outcome: &str, _bytes: usize) {}
}
