use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use crate::backend::{Backend, CancellationToken, Cas, Version};
use crate::error::BackendError;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, (String, u64)>,
}

/// In-memory [`Backend`] backed by a single `RwLock` and a shared [`Notify`]
/// that wakes every in-flight watch on any write. Suitable for tests and for
/// the CLI's built-in demonstration plugin.
///
/// All data is lost on process exit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<RwLock<Inner>>,
    changed: Arc<Notify>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn read(&self, key: &str) -> Result<(String, Version), BackendError> {
        let guard = self.inner.read().await;
        match guard.entries.get(key) {
            Some((value, version)) => Ok((value.clone(), Version(*version))),
            None => Err(BackendError::KeyMissing),
        }
    }

    async fn watch(
        &self,
        key: &str,
        since: Version,
        cancel: &CancellationToken,
    ) -> Result<(String, Version), BackendError> {
        loop {
            {
                let guard = self.inner.read().await;
                if let Some((value, version)) = guard.entries.get(key) {
                    if *version > since.0 {
                        return Ok((value.clone(), Version(*version)));
                    }
                }
            }

            tokio::select! {
                _ = self.changed.notified() => continue,
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            }
        }
    }

    async fn write(&self, key: &str, value: &str, cas: Cas) -> Result<Version, BackendError> {
        let mut guard = self.inner.write().await;
        let new_version = match (guard.entries.get(key), cas) {
            (None, Cas::CreateOnly) => 1,
            (None, Cas::Version(_)) => return Err(BackendError::Contended),
            (Some(_), Cas::CreateOnly) => return Err(BackendError::Contended),
            (Some((_, current)), Cas::Version(expected)) if *current == expected.0 => {
                current + 1
            }
            (Some(_), Cas::Version(_)) => return Err(BackendError::Contended),
        };
        guard.entries.insert(key.to_string(), (value.to_string(), new_version));
        drop(guard);
        self.changed.notify_waiters();
        Ok(Version(new_version))
    }

    async fn delete(&self, key: &str, cas: Version) -> Result<(), BackendError> {
        let mut guard = self.inner.write().await;
        match guard.entries.get(key) {
            Some((_, current)) if *current == cas.0 => {
                guard.entries.remove(key);
            }
            Some(_) => return Err(BackendError::Contended),
            None => return Err(BackendError::KeyMissing),
        }
        drop(guard);
        self.changed.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_missing_key_errors() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.read("k").await,
            Err(BackendError::KeyMissing)
        ));
    }

    #[tokio::test]
    async fn create_only_then_write_with_version() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();
        assert_eq!(v1, Version(1));

        let v2 = backend.write("k", "b", Cas::Version(v1)).await.unwrap();
        assert_eq!(v2, Version(2));

        let (value, version) = backend.read("k").await.unwrap();
        assert_eq!(value, "b");
        assert_eq!(version, Version(2));
    }

    #[tokio::test]
    async fn stale_cas_is_contended() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();
        backend.write("k", "b", Cas::Version(v1)).await.unwrap();

        let result = backend.write("k", "c", Cas::Version(v1)).await;
        assert!(matches!(result, Err(BackendError::Contended)));
    }

    #[tokio::test]
    async fn create_only_twice_is_contended() {
        let backend = InMemoryBackend::new();
        backend.write("k", "a", Cas::CreateOnly).await.unwrap();
        let result = backend.write("k", "b", Cas::CreateOnly).await;
        assert!(matches!(result, Err(BackendError::Contended)));
    }

    #[tokio::test]
    async fn watch_returns_immediately_if_already_changed() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();
        backend.write("k", "b", Cas::Version(v1)).await.unwrap();

        let cancel = CancellationToken::new();
        let (value, version) = backend.watch("k", v1, &cancel).await.unwrap();
        assert_eq!(value, "b");
        assert_eq!(version, Version(2));
    }

    #[tokio::test]
    async fn watch_blocks_until_write_then_wakes() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();

        let watcher_backend = backend.clone();
        let cancel = CancellationToken::new();
        let cancel_for_watch = cancel.clone();
        let handle = tokio::spawn(async move {
            watcher_backend.watch("k", v1, &cancel_for_watch).await
        });

        tokio::task::yield_now().await;
        backend.write("k", "b", Cas::Version(v1)).await.unwrap();

        let (value, version) = handle.await.unwrap().unwrap();
        assert_eq!(value, "b");
        assert_eq!(version, Version(2));
    }

    #[tokio::test]
    async fn watch_cancelled_returns_error() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();

        let watcher_backend = backend.clone();
        let cancel = CancellationToken::new();
        let cancel_for_watch = cancel.clone();
        let handle =
            tokio::spawn(async move { watcher_backend.watch("k", v1, &cancel_for_watch).await });

        tokio::task::yield_now().await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(BackendError::Cancelled)));
    }

    #[tokio::test]
    async fn delete_requires_matching_version() {
        let backend = InMemoryBackend::new();
        let v1 = backend.write("k", "a", Cas::CreateOnly).await.unwrap();
        assert!(backend.delete("k", Version(99)).await.is_err());
        backend.delete("k", v1).await.unwrap();
        assert!(matches!(
            backend.read("k").await,
            Err(BackendError::KeyMissing)
        ));
    }
}
