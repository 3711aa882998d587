//! In-process session store
//!
//! Entries live in a `HashMap` behind a tokio Mutex. Expiry is checked with
//! `tokio::time::Instant`, so tests can pause and advance the clock to
//! exercise TTL elapse without sleeping.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{SessionStore, StoreFuture};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Session store held in process memory.
///
/// Expired entries are never returned. They are swept lazily on every write
/// so the map stays bounded by the number of live flows.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemoryStore {
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            entries.retain(|_, e| e.is_live(now));
            entries.insert(
                key.to_owned(),
                Entry {
                    value,
                    expires_at: now + ttl,
                },
            );
            debug!(key, ttl_secs = ttl.as_secs(), "stored session entry");
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let now = Instant::now();
            let entries = self.entries.lock().await;
            Ok(entries
                .get(key)
                .filter(|e| e.is_live(now))
                .map(|e| e.value.clone()))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            if entries.remove(key).is_some() {
                debug!(key, "deleted session entry");
            }
            Ok(())
        })
    }

    fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            let value = entries
                .remove(key)
                .filter(|e| e.is_live(now))
                .map(|e| e.value);
            if value.is_some() {
                debug!(key, "took session entry");
            }
            Ok(value)
        })
    }
}
