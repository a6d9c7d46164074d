//! Sequential async coordinator
//!
//! Resolves an ordered list of [`Step`]s strictly one after another:
//! - step n+1 is never started before step n has settled
//! - results keep input order, whatever each step's latency
//! - the first failure wins and later deferred steps are never invoked
//!
//! The coordinator keeps no state between invocations and does not log;
//! interpreting the outcome is the caller's job.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use crate::error::RunError;
use crate::step::{Deferred, Resolution, Settled, Step};

/// Transient state of one invocation
struct Run<T, E> {
    /// Successful values, in step order
    results: Vec<T>,
    /// First recorded failure; never overwritten once set
    failure: Option<RunError<E>>,
    /// Index of the next step to resolve
    cursor: usize,
}

impl<T, E> Run<T, E> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            failure: None,
            cursor: 0,
        }
    }

    fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    fn record_failure(&mut self, failure: RunError<E>) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    /// Resolve one step and move the cursor past it
    async fn advance(&mut self, step: Step<T, E>) {
        let index = self.cursor;
        self.cursor += 1;

        let settled = match step {
            Step::Value(value) => Ok(value),
            Step::Deferred(deferred) => match resolve(deferred).await {
                Ok(settled) => settled,
                Err(payload) => {
                    self.record_failure(panic_failure(index, payload));
                    return;
                }
            },
        };

        match settled {
            Ok(value) => self.results.push(value),
            Err(Some(error)) => self.record_failure(RunError::Step { index, error }),
            Err(None) => self.record_failure(RunError::Unspecified { index }),
        }
    }

    fn finish(self) -> Result<Vec<T>, RunError<E>> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.results),
        }
    }
}

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Invoke a deferred step and wait for it, catching panics from both the call and the future
async fn resolve<T, E>(deferred: Deferred<T, E>) -> Result<Settled<T, E>, PanicPayload> {
    match panic::catch_unwind(AssertUnwindSafe(move || deferred.invoke()))? {
        Resolution::Ready(settled) => Ok(settled),
        Resolution::Pending(fut) => AssertUnwindSafe(fut).catch_unwind().await,
    }
}

fn panic_failure<E>(index: usize, payload: PanicPayload) -> RunError<E> {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());

    match message {
        Some(message) => RunError::Panicked { index, message },
        None => RunError::Unspecified { index },
    }
}

/// Run `steps` one at a time, in order.
///
/// Resolves to every step's value in input order, or to the first failure.
/// Partial results of a failed run are dropped. An empty input resolves to
/// an empty `Vec`.
///
/// The input is collected before the returned future is first polled;
/// no deferred step is invoked until then.
///
/// ```
/// use stepwise::{sequential_run, Step};
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let steps: Vec<Step<i32, String>> = vec![
///     Step::value(1),
///     Step::deferred(|| async { Ok(2) }),
///     Step::immediate(|| Ok(3)),
/// ];
/// assert_eq!(sequential_run(steps).await, Ok(vec![1, 2, 3]));
/// # });
/// ```
pub fn sequential_run<T, E, I>(steps: I) -> impl Future<Output = Result<Vec<T>, RunError<E>>>
where
    I: IntoIterator<Item = Step<T, E>>,
{
    let steps: Vec<Step<T, E>> = steps.into_iter().collect();

    async move {
        let mut run = Run::with_capacity(steps.len());
        for step in steps {
            if run.is_failed() {
                break;
            }
            run.advance(step).await;
        }
        run.finish()
    }
}

/// Input normalization for the `sequential_run!` macro.
///
/// A lone macro argument is resolved by method lookup on `&&Input<X>`.
/// Lookup stops at the first receiver depth with a matching impl, so the
/// impls are layered by depth:
/// 1. `&Input<Vec<Step>>` / `&Input<[Step; N]>`: steps, passed through
/// 2. `&&Input<Vec<T>>` / `&&Input<[T; N]>`: values, each wrapped with `Step::from`
/// 3. `Input<X>`: anything else is a single step
#[doc(hidden)]
#[allow(clippy::wrong_self_convention)]
pub mod dispatch {
    use std::cell::Cell;

    use crate::step::Step;

    pub struct Input<X>(Cell<Option<X>>);

    impl<X> Input<X> {
        pub fn new(input: X) -> Self {
            Self(Cell::new(Some(input)))
        }

        fn take(&self) -> Option<X> {
            self.0.take()
        }
    }

    pub trait StepList<T, E> {
        fn into_step_list(&self) -> Vec<Step<T, E>>;
    }

    impl<T, E> StepList<T, E> for &Input<Vec<Step<T, E>>> {
        fn into_step_list(&self) -> Vec<Step<T, E>> {
            self.take().unwrap_or_default()
        }
    }

    impl<T, E, const N: usize> StepList<T, E> for &Input<[Step<T, E>; N]> {
        fn into_step_list(&self) -> Vec<Step<T, E>> {
            self.take().into_iter().flatten().collect()
        }
    }

    pub trait ValueList<T> {
        fn into_step_list<E>(&self) -> Vec<Step<T, E>>;
    }

    impl<T> ValueList<T> for &&Input<Vec<T>> {
        fn into_step_list<E>(&self) -> Vec<Step<T, E>> {
            self.take().into_iter().flatten().map(Step::from).collect()
        }
    }

    impl<T, const N: usize> ValueList<T> for &&Input<[T; N]> {
        fn into_step_list<E>(&self) -> Vec<Step<T, E>> {
            self.take().into_iter().flatten().map(Step::from).collect()
        }
    }

    pub trait SingleStep<X> {
        fn into_step_list<T, E>(&self) -> Vec<Step<T, E>>
        where
            Step<T, E>: From<X>;
    }

    impl<X> SingleStep<X> for Input<X> {
        fn into_step_list<T, E>(&self) -> Vec<Step<T, E>>
        where
            Step<T, E>: From<X>,
        {
            self.take().into_iter().map(Step::from).collect()
        }
    }
}

/// Variadic form of [`sequential_run`].
///
/// Each argument goes through `Step::from`, so plain values and [`Step`]s
/// can be mixed. A single argument that is a sequence (a bracketed list, a
/// `Vec` or an array, of steps or of plain values) is unpacked as the step
/// list, so `sequential_run!(a, b, c)`, `sequential_run!([a, b, c])` and
/// `sequential_run!(steps)` with `steps = vec![a, b, c]` are the same run.
///
/// ```
/// use stepwise::{sequential_run, RunError, Step};
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let outcome: Result<Vec<i32>, RunError<String>> =
///     sequential_run!(1, Step::deferred(|| async { Ok(2) }), 3).await;
/// assert_eq!(outcome, Ok(vec![1, 2, 3]));
/// # });
/// ```
#[macro_export]
macro_rules! sequential_run {
    () => {
        $crate::sequential_run(::std::vec::Vec::<$crate::Step<_, _>>::new())
    };
    ([$($step:expr),* $(,)?]) => {
        $crate::sequential_run(::std::vec![$($crate::Step::from($step)),*])
    };
    ($input:expr $(,)?) => {{
        #[allow(unused_imports)]
        use $crate::coordinator::dispatch::{SingleStep as _, StepList as _, ValueList as _};
        let input = $crate::coordinator::dispatch::Input::new($input);
        $crate::sequential_run((&&input).into_step_list())
    }};
    ($($step:expr),+ $(,)?) => {
        $crate::sequential_run(::std::vec![$($crate::Step::from($step)),+])
    };
}
