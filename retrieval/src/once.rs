//! Initialize-once cells for process-wide resources.
//!
//! The first caller runs the initializer; callers arriving while it is in
//! flight wait for it instead of starting a second one. The outcome, success
//! or failure, is kept for the life of the cell. If the initializing future
//! is dropped (the request was cancelled), the next waiter runs the
//! initializer instead; a half-built value is never observable.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

/// Outcome stored in an [`InitOnce`].
pub type Shared<T, E> = Result<Arc<T>, Arc<E>>;

/// A value built at most once, on first use, and shared read-only after.
#[derive(Debug)]
pub struct InitOnce<T, E> {
    cell: OnceCell<Shared<T, E>>,
}

impl<T, E> InitOnce<T, E> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Create a cell that already holds `value`.
    pub fn ready(value: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Ok(Arc::new(value)))),
        }
    }

    /// Return the value, running `init` if nobody has yet.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Shared<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_init(|| async move { init().await.map(Arc::new).map_err(Arc::new) })
            .await
            .clone()
    }

    /// The stored outcome, if initialization has finished.
    pub fn get(&self) -> Option<&Shared<T, E>> {
        self.cell.get()
    }

    /// Whether initialization finished successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}

impl<T, E> Default for InitOnce<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_initialization() {
        let cell: Arc<InitOnce<String, String>> = Arc::new(InitOnce::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cell = Arc::clone(&cell);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cell.get_or_init(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>("store".to_string())
                })
                .await
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value.as_str(), "store");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cell.is_ready());
    }

    #[tokio::test]
    async fn test_failure_is_permanent() {
        let cell: InitOnce<String, String> = InitOnce::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cell
                .get_or_init(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("missing".to_string())
                })
                .await;
            assert_eq!(result.unwrap_err().as_str(), "missing");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cell.is_ready());
    }

    #[tokio::test]
    async fn test_ready_skips_initializer() {
        let cell: InitOnce<u32, String> = InitOnce::ready(7);
        let calls = AtomicUsize::new(0);
        let value = cell
            .get_or_init(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .await
            .unwrap();
        assert_eq!(*value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_initialization_is_retried() {
        let cell: InitOnce<u32, String> = InitOnce::new();

        let slow = cell.get_or_init(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(10), slow)
                .await
                .is_err()
        );
        assert!(cell.get().is_none());

        let value = cell.get_or_init(|| async { Ok(2) }).await.unwrap();
        assert_eq!(*value, 2);
    }
}
