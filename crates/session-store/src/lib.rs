//! Ephemeral session storage for in-flight OAuth flows
//!
//! Defines the `SessionStore` trait that the flow state machine uses for
//! short-lived values: anti-forgery state, PKCE verifiers and freshly
//! issued credentials. Every entry carries its own TTL; an expired entry is
//! indistinguishable from one that was never written.
//!
//! `MemoryStore` is the in-process implementation. Deployments that run more
//! than one replica plug a shared backend in behind the same trait.

pub mod memory;

pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Errors from a session store backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value store with per-key expiration.
///
/// Uses `Pin<Box<dyn Future>>` return types so the flow can hold an
/// `Arc<dyn SessionStore>`.
pub trait SessionStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous entry. The entry
    /// disappears once `ttl` has elapsed.
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Read the value under `key`. Returns `None` when the key was never
    /// written, was deleted, or has expired.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Read and remove `key` in one step (delete-on-read).
    ///
    /// The default issues `get` then `delete`; backends with an atomic
    /// get-and-delete should override it so two concurrent readers can never
    /// both observe the value.
    fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let value = self.get(key).await?;
            if value.is_some() {
                self.delete(key).await?;
            }
            Ok(value)
        })
    }
}
