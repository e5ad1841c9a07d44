//! Launch-all, await-all fan-out.
//!
//! [`settle_all`] runs one future per item concurrently on the current task
//! and waits until every one has settled. A failing or panicking task is
//! captured as an `Err` in its slot; it never cancels its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::join_all;
use futures::FutureExt;

use crate::PitchError;

/// Runs `task` for every item and returns each outcome in input order.
pub async fn settle_all<I, F, Fut, T>(items: I, mut task: F) -> Vec<Result<T, PitchError>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, PitchError>>,
{
    let pending = items.into_iter().map(|item| {
        let settled = AssertUnwindSafe(task(item)).catch_unwind();
        async move {
            match settled.await {
                Ok(result) => result,
                Err(payload) => Err(PitchError::external(format!(
                    "task panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        }
    });
    join_all(pending).await
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
