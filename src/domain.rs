use crate::errors::BackendError;
use crate::models::Snapshot;
use async_trait::async_trait;

/// A place a whole [`Snapshot`] can be loaded from and saved to.
///
/// Implementations: the remote object store, local durable key/value
/// storage, and the memory-only fallback.
#[async_trait]
pub trait SnapshotBackend: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Short name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Retrieves the last saved snapshot.
    /// Returns Ok(None) if nothing has been saved yet or the stored payload is unusable.
    /// Returns Err only on real I/O failures.
    async fn load(&self) -> Result<Option<Snapshot>, BackendError>;

    /// Persists the snapshot verbatim, replacing prior content.
    /// Saving the same snapshot twice is safe.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), BackendError>;
}

/// Parses a stored payload; anything malformed counts as "nothing saved".
pub fn decode_snapshot(backend: &str, raw: &[u8]) -> Option<Snapshot> {
    match serde_json::from_slice::<Snapshot>(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(backend = %backend, error = %e, "Stored snapshot is malformed, treating as absent");
            None
        }
    }
}
