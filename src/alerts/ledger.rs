use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    models::AlertEvent,
    storage::{KvStore, StorageError},
};

/// Storage key for the persisted ledger blob.
const ALERTS_KEY: &str = "plant_alerts";

/// Maximum number of events retained; oldest are evicted first.
pub const MAX_ALERTS: usize = 50;

/// Durable, capped, most-recent-first log of alert events.
///
/// The in-memory vector is authoritative between writes; every mutation
/// rewrites the whole blob under the write lock, so concurrent appends
/// serialise and the capacity rule is re-applied on each write. A failed
/// persist keeps the in-memory state and is retried implicitly by the next
/// successful write.
#[derive(Clone)]
pub struct AlertLedger {
    store: KvStore,
    inner: Arc<RwLock<Vec<AlertEvent>>>,
}

impl AlertLedger {
    /// Load the persisted ledger, starting empty when the blob is missing
    /// or unreadable (the error is logged, not propagated — alert history
    /// is never worth refusing to start over).
    pub async fn load(store: KvStore) -> Self {
        let events = match store.read::<Vec<AlertEvent>>(ALERTS_KEY).await {
            Ok(Some(events)) => events,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not load persisted alerts, starting empty");
                Vec::new()
            }
        };

        Self {
            store,
            inner: Arc::new(RwLock::new(events)),
        }
    }

    /// Prepend `event`, enforce capacity, persist.
    ///
    /// Appending an id that is already present is a no-op, so a retried
    /// append after a persistence failure cannot duplicate an entry.
    pub async fn append(&self, event: AlertEvent) -> Result<(), StorageError> {
        let mut events = self.inner.write().await;
        if events.iter().any(|e| e.id == event.id) {
            return Ok(());
        }

        info!(plant_id = %event.plant_id, kind = %event.kind, "new alert");
        events.insert(0, event);
        events.truncate(MAX_ALERTS);
        self.store.write(ALERTS_KEY, &*events).await
    }

    /// Append a batch of events; each is inserted at the front in turn, so
    /// the batch's last element ends up newest. One persist for the whole
    /// batch.
    pub async fn append_all(&self, batch: Vec<AlertEvent>) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut events = self.inner.write().await;
        for event in batch {
            if events.iter().any(|e| e.id == event.id) {
                continue;
            }
            info!(plant_id = %event.plant_id, kind = %event.kind, "new alert");
            events.insert(0, event);
        }
        events.truncate(MAX_ALERTS);
        self.store.write(ALERTS_KEY, &*events).await
    }

    /// Current ledger, most-recent-first, at most [`MAX_ALERTS`] entries.
    pub async fn list(&self) -> Vec<AlertEvent> {
        self.inner.read().await.clone()
    }

    /// Flip `acknowledged` to true for the matching entry.
    ///
    /// Unknown ids are a no-op, not an error: the entry may already have
    /// been evicted by capacity truncation.
    pub async fn acknowledge(&self, id: &str) -> Result<(), StorageError> {
        let mut events = self.inner.write().await;
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return Ok(());
        };
        if event.acknowledged {
            return Ok(());
        }
        event.acknowledged = true;
        self.store.write(ALERTS_KEY, &*events).await
    }

    /// Number of unacknowledged events.
    pub async fn unacknowledged(&self) -> usize {
        self.inner.read().await.iter().filter(|e| !e.acknowledged).count()
    }
}
