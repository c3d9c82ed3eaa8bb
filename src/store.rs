use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, memory-resident state guarded by a single lock.
///
/// Closures passed to [`Store::read`] and [`Store::write`] are synchronous, so a
/// mutation can never straddle an `.await` and every write is atomic with
/// respect to the keys it touches.
#[derive(Debug)]
pub struct Store<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Send + Sync + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Send + Sync + 'static> Store<T> {
    pub fn new(data: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.read().await;
        f(&guard)
    }

    pub async fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }
}
