//! Error containment
//!
//! [`Contained`] wraps a fallible callable into one that never fails: it
//! returns `Some(value)` on success and `None` on failure, keeping the last
//! error for inspection.
//!
//! A deferred step built on a contained callable is never seen as failed by
//! the coordinator, so it no longer short-circuits the run.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::step::Step;

/// Shared "last error" slot for one or more contained callables
pub struct Contained<E> {
    last_error: Arc<Mutex<Option<E>>>,
}

impl<E> Contained<E> {
    pub fn new() -> Self {
        Self {
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Last recorded error; a later success does not clear it
    pub fn last_error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.last_error.lock().clone()
    }

    pub fn take_last_error(&self) -> Option<E> {
        self.last_error.lock().take()
    }

    pub fn has_failed(&self) -> bool {
        self.last_error.lock().is_some()
    }
}

impl<E: Send + 'static> Contained<E> {
    /// Wrap a synchronous callable
    pub fn wrap<T, F>(&self, mut f: F) -> impl FnMut() -> Option<T> + Send
    where
        F: FnMut() -> Result<T, E> + Send,
    {
        let slot = Arc::clone(&self.last_error);
        move || match f() {
            Ok(value) => Some(value),
            Err(err) => {
                *slot.lock() = Some(err);
                None
            }
        }
    }

    /// Wrap a callable returning a future
    pub fn wrap_async<T, F, Fut>(&self, mut f: F) -> impl FnMut() -> BoxFuture<'static, Option<T>> + Send
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::clone(&self.last_error);
        move || {
            let slot = Arc::clone(&slot);
            let fut = f();
            async move {
                match fut.await {
                    Ok(value) => Some(value),
                    Err(err) => {
                        *slot.lock() = Some(err);
                        None
                    }
                }
            }
            .boxed()
        }
    }

    /// Deferred step that always succeeds: `Some(value)` or `None`
    pub fn step<T, X, F, Fut>(&self, f: F) -> Step<Option<T>, X>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        X: Send + 'static,
    {
        let slot = Arc::clone(&self.last_error);
        Step::deferred(move || {
            let fut = f();
            async move {
                Ok(match fut.await {
                    Ok(value) => Some(value),
                    Err(err) => {
                        *slot.lock() = Some(err);
                        None
                    }
                })
            }
        })
    }
}

impl<E> Clone for Contained<E> {
    fn clone(&self) -> Self {
        Self {
            last_error: Arc::clone(&self.last_error),
        }
    }
}

impl<E> Default for Contained<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: fmt::Debug> fmt::Debug for Contained<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contained")
            .field("last_error", &*self.last_error.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use crate::sequential_run;

    #[test]
    fn wrap_returns_value_on_success() {
        let contained: Contained<String> = Contained::new();
        let mut parse = contained.wrap(|| "12".parse::<i32>().map_err(|e| e.to_string()));
        assert_eq!(parse(), Some(12));
        assert!(!contained.has_failed());
    }

    #[test]
    fn wrap_records_last_error() {
        let contained: Contained<&str> = Contained::new();
        let mut attempts = 0;
        let mut flaky = contained.wrap(move || {
            attempts += 1;
            match attempts {
                1 => Err("first"),
                2 => Err("second"),
                _ => Ok(attempts),
            }
        });

        assert_eq!(flaky(), None);
        assert_eq!(flaky(), None);
        assert_eq!(contained.last_error(), Some("second"));

        // success keeps the last error around
        assert_eq!(flaky(), Some(3));
        assert_eq!(contained.take_last_error(), Some("second"));
        assert_eq!(contained.last_error(), None);
    }

    #[tokio::test]
    async fn wrap_async_never_fails() {
        let contained: Contained<String> = Contained::new();
        let mut fetch = contained.wrap_async(|| async { Err::<i32, _>("offline".to_string()) });

        assert_eq!(fetch().await, None);
        assert_eq!(contained.last_error().as_deref(), Some("offline"));
    }

    #[tokio::test]
    async fn contained_step_does_not_short_circuit() {
        let contained: Contained<String> = Contained::new();
        let steps: Vec<Step<Option<i32>, String>> = vec![
            Step::value(Some(1)),
            contained.step(|| async { Err("hidden".to_string()) }),
            Step::value(Some(3)),
        ];

        let outcome: Result<_, RunError<String>> = sequential_run(steps).await;
        assert_eq!(outcome, Ok(vec![Some(1), None, Some(3)]));
        assert_eq!(contained.last_error().as_deref(), Some("hidden"));
    }
}
