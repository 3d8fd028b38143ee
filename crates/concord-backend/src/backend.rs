use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::BackendError;

/// Opaque, totally-ordered per-key version returned by every read and write
/// (spec §3's "versioned record").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

/// Write precondition: either "only if the key doesn't exist yet" or "only
/// if the current version equals this one" (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub enum Cas {
    CreateOnly,
    Version(Version),
}

/// Cooperative cancellation for an in-flight [`Backend::watch`] call (spec
/// §4.1, §5: "watch must be cancellable cooperatively so termination does
/// not require killing the thread").
///
/// `Notify::notify_waiters` alone stores no permit: a `cancel()` that lands
/// before a task starts `cancelled().await` would otherwise be lost. The
/// `cancelled` flag latches the signal so it's observed regardless of
/// ordering between `cancel()` and `cancelled()`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent; safe to call from any task.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify_waiters();
    }

    /// Resolves once [`CancellationToken::cancel`] has been called, even if
    /// that happened before this call started.
    pub async fn cancelled(&self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.inner.notified().await;
    }
}

/// Uniform watch/read/CAS-write/delete over a distributed KV store (spec §4.1).
///
/// All operations are `async` and may block the caller for up to the
/// backend's watch timeout. Implementations must return every version they
/// ever observe exactly once per `watch` call (at-most-once delivery of a
/// given version per watch).
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Linearizable read. `Err(BackendError::KeyMissing)` if the key does
    /// not exist.
    async fn read(&self, key: &str) -> Result<(String, Version), BackendError>;

    /// Blocks until `key` changes past `since`, or returns immediately if it
    /// already has. Cooperatively cancellable via `cancel`.
    async fn watch(
        &self,
        key: &str,
        since: Version,
        cancel: &CancellationToken,
    ) -> Result<(String, Version), BackendError>;

    /// Conditional write. Returns the new version on success.
    async fn write(&self, key: &str, value: &str, cas: Cas) -> Result<Version, BackendError>;

    /// Conditional delete.
    async fn delete(&self, key: &str, cas: Version) -> Result<(), BackendError>;
}
