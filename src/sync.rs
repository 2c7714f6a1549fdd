//! Offline/online reconciliation for writes destined upstream.
//!
//! While offline, outbound operations are queued durably instead of sent.
//! When connectivity returns the queue drains in FIFO order, one operation
//! at a time; the first failure re-queues its operation at the front and
//! stops the drain, so upstream always sees operations in submission order
//! (head-of-line blocking is the accepted trade-off). Replay carries no
//! dedup key: an operation that was applied upstream but failed locally
//! will be sent again.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::storage::{KvStore, StorageError};

/// Storage key for the persisted pending-operations queue.
const PENDING_KEY: &str = "pending_sync";

/// One write queued for replay against the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOp {
    pub endpoint: String,
    pub method: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Sends one queued operation upstream. The production implementation is
/// the plants API client; tests inject fakes.
pub trait SyncTransport {
    fn send(&self, op: &PendingOp) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Shared connectivity signal backed by a watch channel.
///
/// Writers (the monitor loop, outbound request paths) flip the flag;
/// the sync coordinator subscribes and drains on offline → online edges.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self) {
        self.set(true);
    }

    pub fn set_offline(&self) {
        self.set(false);
    }

    fn set(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Durable FIFO queue of pending upstream writes plus the drain loop.
#[derive(Clone)]
pub struct SyncCoordinator<T> {
    store: KvStore,
    transport: T,
    connectivity: Connectivity,
    queue: Arc<Mutex<Vec<PendingOp>>>,
}

impl<T: SyncTransport> SyncCoordinator<T> {
    /// Load the persisted queue, starting empty when the blob is missing
    /// or unreadable.
    pub async fn load(store: KvStore, transport: T, connectivity: Connectivity) -> Self {
        let queue = match store.read::<Vec<PendingOp>>(PENDING_KEY).await {
            Ok(Some(queue)) => queue,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not load pending sync queue, starting empty");
                Vec::new()
            }
        };

        Self {
            store,
            transport,
            connectivity,
            queue: Arc::new(Mutex::new(queue)),
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Append an operation to the back of the queue and persist it.
    pub async fn enqueue(&self, op: PendingOp) -> Result<(), StorageError> {
        let mut queue = self.queue.lock().await;
        info!(endpoint = %op.endpoint, method = %op.method, queued = queue.len() + 1,
            "queued operation for later sync");
        queue.push(op);
        self.store.write(PENDING_KEY, &*queue).await
    }

    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Drain queued operations in FIFO order, one at a time.
    ///
    /// Stops at the first failure, putting the failed operation back at the
    /// front for the next connectivity event. Returns how many operations
    /// were replayed. The queue blob is rewritten after every operation so
    /// an abandoned drain never loses or reorders entries.
    pub async fn drain(&self) -> Result<usize, StorageError> {
        let mut queue = self.queue.lock().await;
        let mut drained = 0;

        while !queue.is_empty() {
            let op = queue.remove(0);
            match self.transport.send(&op).await {
                Ok(()) => {
                    drained += 1;
                    self.store.write(PENDING_KEY, &*queue).await?;
                }
                Err(e) => {
                    warn!(endpoint = %op.endpoint, error = %e,
                        "sync replay failed, keeping operation queued");
                    queue.insert(0, op);
                    self.store.write(PENDING_KEY, &*queue).await?;
                    break;
                }
            }
        }

        if drained > 0 {
            info!(drained, remaining = queue.len(), "sync queue drained");
        }
        Ok(drained)
    }

    /// Run forever, draining while online and after every flip back to
    /// online. Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        let mut rx = self.connectivity.subscribe();
        loop {
            if *rx.borrow_and_update() {
                if let Err(e) = self.drain().await {
                    warn!(error = %e, "failed to persist sync queue during drain");
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
