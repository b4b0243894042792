//! Trailing-edge debounce for reload triggers.

use crate::runtime::{CancelToken, Fault};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

/// Collapse bursts of events into single actions.
///
/// Every received event (re)starts one timer of length `window`. When the timer
/// expires without a new event, `on_settled` runs once and is awaited before the
/// next event is considered. A panic in `on_settled` is logged and the loop
/// keeps running. The loop ends when `cancel` fires or every sender of `events`
/// is dropped; a pending timer is discarded in both cases.
///
/// The timer lives only in this function's state, so no other task can reset or
/// observe it.
pub async fn debounce<E, F, Fut>(
    mut events: mpsc::UnboundedReceiver<E>,
    window: Duration,
    cancel: CancelToken,
    mut on_settled: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(_) => deadline = Some(Instant::now() + window),
                None => break,
            },
            _ = timer => {
                deadline = None;
                let settled = async { on_settled().await };
                if let Err(payload) = AssertUnwindSafe(settled).catch_unwind().await {
                    tracing::error!(error = %Fault::from_panic(payload), "debounced action panicked");
                }
            }
        }
    }
}
