//! Generic time-boxed cache with single-flight fetches.
//!
//! One abstraction for every "refetch at most every N seconds" resource,
//! instead of a TTL comparison re-implemented per resource type. Concurrent
//! callers asking for the same expired key share one in-flight fetch and
//! all resolve from its result, rather than polling a loading flag.

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use tokio::sync::{watch, Mutex};
use tracing::debug;

#[derive(Clone)]
enum Entry<V> {
    Ready { value: V, fetched_at: Instant },
    /// A fetch for this key is in flight; waiters subscribe to the channel.
    /// `Some(Ok(v))` on success, `Some(Err(msg))` on failure.
    InFlight(watch::Receiver<Option<Result<V, String>>>),
}

/// Time-boxed cache parameterized by key and TTL.
///
/// Values are cloned out, so `V` should be cheap to clone (or an `Arc`).
#[derive(Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached value for `key` if it is fresher than the TTL;
    /// otherwise run `fetch`, sharing the result with every concurrent
    /// caller of the same key.
    ///
    /// A failed fetch is not cached: the next caller retries.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> anyhow::Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let mut rx = {
            let mut entries = self.inner.lock().await;
            match entries.get(&key) {
                Some(Entry::Ready { value, fetched_at }) if fetched_at.elapsed() < self.ttl => {
                    return Ok(value.clone());
                }
                Some(Entry::InFlight(rx)) => rx.clone(),
                _ => {
                    // This caller leads the fetch; others subscribe.
                    let (tx, rx) = watch::channel(None);
                    entries.insert(key.clone(), Entry::InFlight(rx));
                    drop(entries);
                    return self.lead_fetch(key, fetch, tx).await;
                }
            }
        };

        debug!("joining in-flight fetch");
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result.map_err(|msg| anyhow!("shared fetch failed: {msg}"));
            }
            if rx.changed().await.is_err() {
                return Err(anyhow!("in-flight fetch abandoned"));
            }
        }
    }

    async fn lead_fetch<F, Fut>(
        &self,
        key: K,
        fetch: F,
        tx: watch::Sender<Option<Result<V, String>>>,
    ) -> anyhow::Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let result = fetch().await;
        let mut entries = self.inner.lock().await;

        match result {
            Ok(value) => {
                entries.insert(
                    key,
                    Entry::Ready {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                let _ = tx.send(Some(Ok(value.clone())));
                Ok(value)
            }
            Err(e) => {
                entries.remove(&key);
                let _ = tx.send(Some(Err(e.to_string())));
                Err(e)
            }
        }
    }

    /// Drop the cached value for `key`, forcing the next call to refetch.
    pub async fn invalidate(&self, key: &K) {
        self.inner.lock().await.remove(key);
    }
}
