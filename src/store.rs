//! The live snapshot, its backend chain, and the lifecycle around them.
//! Mutations, saves and reloads all queue on one lock.

use crate::catalog::CatalogStore;
use crate::directory::DirectoryStore;
use crate::domain::SnapshotBackend;
use crate::errors::BackendError;
use crate::models::{MediaType, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SaveOutcome {
    Saved,
    Failed(String),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// Published after every save attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveEvent {
    pub backend: Option<&'static str>,
    /// Version the attempted snapshot carried.
    pub version: u64,
    pub outcome: SaveOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub media_count: usize,
    pub photo_count: usize,
    pub video_count: usize,
    pub member_count: usize,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub backend: Option<&'static str>,
    pub phase: Phase,
}

struct StoreState {
    snapshot: Snapshot,
    phase: Phase,
    /// Index of the pinned backend.
    active: Option<usize>,
}

struct StoreInner {
    backends: Vec<Arc<dyn SnapshotBackend>>,
    admin_password: String,
    state: RwLock<StoreState>,
    save_lock: Mutex<()>,
    events: broadcast::Sender<SaveEvent>,
}

/// Entry point for everything outside the store. Cheap to clone; clones
/// share the same snapshot.
#[derive(Clone)]
pub struct StoreFacade {
    inner: Arc<StoreInner>,
}

impl StoreFacade {
    /// Creates a store over `backends`, highest preference first.
    /// The built-in snapshot is live immediately.
    pub fn new(backends: Vec<Arc<dyn SnapshotBackend>>, admin_password: impl Into<String>) -> Self {
        let admin_password = admin_password.into();
        let (events, _) = broadcast::channel(64);
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        tracing::info!(backends = ?names, "Creating store with default snapshot");

        Self {
            inner: Arc::new(StoreInner {
                backends,
                state: RwLock::new(StoreState {
                    snapshot: Snapshot::builtin(&admin_password),
                    phase: Phase::Uninitialized,
                    active: None,
                }),
                admin_password,
                save_lock: Mutex::new(()),
                events,
            }),
        }
    }

    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(self)
    }

    pub fn directory(&self) -> DirectoryStore<'_> {
        DirectoryStore::new(self)
    }

    /// Receives a [`SaveEvent`] for every save attempt made after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    /// Selects a backend and replaces the default snapshot with its content.
    pub async fn initialize(&self) {
        self.load_from_backends().await;
    }

    /// Runs [`initialize`](Self::initialize) in the background.
    pub fn spawn_initialize(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move { store.initialize().await })
    }

    /// Drops the live snapshot and re-runs backend selection from the top of
    /// the chain.
    pub async fn reload(&self) {
        tracing::info!("Reloading snapshot from backends");
        self.load_from_backends().await;
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.inner.state.read().await;
        let snapshot = &state.snapshot;
        let count_of = |kind: MediaType| {
            snapshot
                .media_items
                .iter()
                .filter(|m| m.media_type == kind)
                .count()
        };

        StoreStats {
            media_count: snapshot.media_items.len(),
            photo_count: count_of(MediaType::Photo),
            video_count: count_of(MediaType::Video),
            member_count: snapshot.members.len(),
            version: snapshot.version,
            last_updated: snapshot.last_updated,
            backend: state.active.map(|i| self.inner.backends[i].name()),
            phase: state.phase,
        }
    }

    /// Copy of the whole live snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.state.read().await.snapshot.clone()
    }

    pub(crate) async fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let state = self.inner.state.read().await;
        f(&state.snapshot)
    }

    /// Applies `f` to the live snapshot and saves it when `f` reports a
    /// change. Returns `None` when nothing changed. Waits behind any save or
    /// reload already in flight, so the change lands on the snapshot that
    /// ends up live.
    pub(crate) async fn mutate(&self, f: impl FnOnce(&mut Snapshot) -> bool) -> Option<SaveOutcome> {
        let _guard = self.inner.save_lock.lock().await;
        let changed = f(&mut self.inner.state.write().await.snapshot);
        if changed {
            Some(self.persist_locked().await)
        } else {
            None
        }
    }

    /// Saves a touched copy of the live snapshot to the pinned backend.
    /// Caller holds `save_lock`.
    async fn persist_locked(&self) -> SaveOutcome {
        let (candidate, backend) = {
            let state = self.inner.state.read().await;
            let mut candidate = state.snapshot.clone();
            candidate.touch();
            let backend = state.active.map(|i| Arc::clone(&self.inner.backends[i]));
            (candidate, backend)
        };

        let outcome = match &backend {
            None => {
                tracing::warn!(version = candidate.version, "No backend selected, change kept in memory only");
                SaveOutcome::Failed(BackendError::Unavailable("no backend selected".into()).to_string())
            }
            Some(backend) => match backend.save(&candidate).await {
                Ok(()) => {
                    tracing::debug!(backend = %backend.name(), version = candidate.version, "Snapshot saved");
                    SaveOutcome::Saved
                }
                Err(e) => {
                    tracing::error!(
                        backend = %backend.name(),
                        version = candidate.version,
                        error = %e,
                        "Snapshot save failed, change kept in memory only"
                    );
                    SaveOutcome::Failed(e.to_string())
                }
            },
        };

        if outcome.is_saved() {
            let mut state = self.inner.state.write().await;
            state.snapshot.version = candidate.version;
            state.snapshot.last_updated = candidate.last_updated;
        }

        let _ = self.inner.events.send(SaveEvent {
            backend: backend.as_ref().map(|b| b.name()),
            version: candidate.version,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn load_from_backends(&self) {
        let _guard = self.inner.save_lock.lock().await;
        self.inner.state.write().await.phase = Phase::Loading;

        let (active, snapshot) = self.select_backend().await;

        let mut state = self.inner.state.write().await;
        tracing::info!(
            backend = ?active.map(|i| self.inner.backends[i].name()),
            version = snapshot.version,
            media = snapshot.media_items.len(),
            members = snapshot.members.len(),
            "Store ready"
        );
        state.snapshot = snapshot;
        state.active = active;
        state.phase = Phase::Ready;
    }

    async fn select_backend(&self) -> (Option<usize>, Snapshot) {
        for (idx, backend) in self.inner.backends.iter().enumerate() {
            match backend.load().await {
                Ok(Some(snapshot)) => {
                    tracing::info!(backend = %backend.name(), version = snapshot.version, "Loaded snapshot");
                    return (Some(idx), snapshot);
                }
                Ok(None) => {
                    let seed = Snapshot::builtin(&self.inner.admin_password);
                    match backend.save(&seed).await {
                        Ok(()) => {
                            tracing::info!(backend = %backend.name(), "No saved snapshot, seeded defaults");
                            return (Some(idx), seed);
                        }
                        Err(e) => {
                            tracing::warn!(backend = %backend.name(), error = %e, "Backend rejected seed write, trying next");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(backend = %backend.name(), error = %e, "Backend load failed, trying next");
                }
            }
        }

        tracing::warn!("No backend available, running on built-in snapshot without persistence");
        (None, Snapshot::builtin(&self.inner.admin_password))
    }
}
