use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

/// A handle on a value that is built on first use and then shared by every holder of the handle.
///
/// Acquisition takes the read lock on the fast path. When the value is missing, the lock is
/// upgraded to a write lock and the presence check is repeated before constructing, so that
/// concurrent first callers end up sharing a single construction. A failed construction
/// leaves the handle empty and the next caller tries again.
pub struct SharedHandle<T>(Arc<RwLock<Option<Arc<T>>>>);

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(None)))
    }
}

impl<T: Send + Sync> SharedHandle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared value, constructing it with `initialize` if no value exists yet.
    pub async fn get_or_try_init<E, F, Fut>(&self, initialize: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let read_lock = self.0.read().await;
        if let Some(value) = read_lock.as_ref() {
            return Ok(value.clone());
        }

        drop(read_lock); // Upgrade to write lock

        let mut write_lock = self.0.write().await;
        if let Some(value) = write_lock.as_ref() {
            return Ok(value.clone());
        }

        let value = Arc::new(initialize().await?);
        *write_lock = Some(value.clone());

        Ok(value)
    }

    /// Returns the value if it has already been constructed
    pub async fn get(&self) -> Option<Arc<T>> {
        self.0.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.0.read().await.is_some()
    }
}
