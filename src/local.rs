use crate::{
    domain::{decode_snapshot, SnapshotBackend},
    errors::BackendError,
    models::Snapshot,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Durable key/value storage: one key, one JSON file under `dir`.
#[derive(Debug, Clone)]
pub struct LocalSnapshotBackend {
    dir: PathBuf,
    key: String,
}

impl LocalSnapshotBackend {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        let dir = dir.into();
        let key = key.into();
        tracing::info!(dir = %dir.display(), %key, "Initializing LocalSnapshotBackend");
        Self { dir, key }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", self.key))
    }
}

async fn write_atomic(tmp: &Path, target: &Path, payload: &[u8]) -> std::io::Result<()> {
    fs::write(tmp, payload).await?;
    fs::rename(tmp, target).await
}

#[async_trait]
impl SnapshotBackend for LocalSnapshotBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load(&self) -> Result<Option<Snapshot>, BackendError> {
        let path = self.path();
        match fs::read(&path).await {
            Ok(raw) => Ok(decode_snapshot(self.name(), &raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Local: No snapshot saved yet");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Local: Failed to read snapshot");
                Err(e.into())
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        let payload = serde_json::to_vec_pretty(snapshot)?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.path();
        write_atomic(&self.tmp_path(), &path, &payload)
            .await
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Local: Failed to write snapshot");
                BackendError::Io(e)
            })?;

        tracing::debug!(path = %path.display(), version = snapshot.version, "Local: Snapshot written");
        Ok(())
    }
}

/// Memory-only fallback. Never has anything to load and never fails to save.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralBackend;

#[async_trait]
impl SnapshotBackend for EphemeralBackend {
    fn name(&self) -> &'static str {
        "ephemeral"
    }

    async fn load(&self) -> Result<Option<Snapshot>, BackendError> {
        Ok(None)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        tracing::trace!(version = snapshot.version, "Ephemeral: Snapshot kept in memory only");
        Ok(())
    }
}
