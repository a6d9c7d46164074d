//! Delay steps
//!
//! A pacing step that resolves after a fixed time with no payload.

use std::time::Duration;

use crate::step::Step;

/// Sleep for `duration` on the tokio timer
pub async fn pause(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Deferred step that waits `duration`, then resolves with `T::default()`.
///
/// The timer only starts when the coordinator reaches the step.
pub fn delay<T, E>(duration: Duration) -> Step<T, E>
where
    T: Default + Send + 'static,
    E: Send + 'static,
{
    Step::deferred(move || async move {
        pause(duration).await;
        Ok(T::default())
    })
}
