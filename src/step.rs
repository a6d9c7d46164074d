//! Step model for the sequential coordinator
//!
//! A [`Step`] is either a value that is already available or a deferred
//! computation: a zero-argument callable that yields its outcome either right
//! away or through a future.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

/// Outcome of a step at the stage level.
///
/// `Err(None)` is a failure that carries no payload.
pub(crate) type Settled<T, E> = Result<T, Option<E>>;

/// What invoking a deferred step hands back to the coordinator
pub enum Resolution<T, E> {
    /// Settled during the call itself (no suspension)
    Ready(Result<T, Option<E>>),
    /// Settles once the future completes (one suspension point)
    Pending(BoxFuture<'static, Result<T, Option<E>>>),
}

/// Zero-argument callable behind [`Step::Deferred`].
///
/// Invoked at most once, and only when every earlier step succeeded.
pub struct Deferred<T, E> {
    call: Box<dyn FnOnce() -> Resolution<T, E> + Send + 'static>,
}

impl<T, E> Deferred<T, E> {
    pub fn new<F>(call: F) -> Self
    where
        F: FnOnce() -> Resolution<T, E> + Send + 'static,
    {
        Self {
            call: Box::new(call),
        }
    }

    /// Run the underlying callable (consumes it)
    pub fn invoke(self) -> Resolution<T, E> {
        (self.call)()
    }
}

/// One input to [`sequential_run`](crate::sequential_run)
pub enum Step<T, E> {
    /// Already-available result; never fails, never suspends
    Value(T),
    /// Computation run when the coordinator reaches it
    Deferred(Deferred<T, E>),
}

impl<T, E> Step<T, E> {
    pub fn value(value: T) -> Self {
        Step::Value(value)
    }

    /// Deferred step backed by an async computation.
    ///
    /// ```
    /// use stepwise::Step;
    ///
    /// let step: Step<u32, String> = Step::deferred(|| async { Ok(42) });
    /// assert!(step.is_deferred());
    /// ```
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Step::Deferred(Deferred::new(move || {
            Resolution::Pending(f().map(|outcome| outcome.map_err(Some)).boxed())
        }))
    }

    /// Deferred step whose callable settles synchronously
    pub fn immediate<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Step::Deferred(Deferred::new(move || Resolution::Ready(f().map_err(Some))))
    }

    /// Deferred step whose failure may carry no payload (`Err(None)`).
    ///
    /// The coordinator surfaces such a failure as
    /// [`RunError::Unspecified`](crate::RunError::Unspecified).
    pub fn bare<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Option<E>>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Step::Deferred(Deferred::new(move || Resolution::Pending(f().boxed())))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Step::Deferred(_))
    }
}

impl<T, E> From<T> for Step<T, E> {
    fn from(value: T) -> Self {
        Step::Value(value)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Step<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Step::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
