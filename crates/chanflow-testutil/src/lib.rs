//! Test helpers for chanflow pipelines.
//!
//! Shared by the integration tests: subscriber setup, hang detection, and a
//! few channel sources and sinks that exercise timing.

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use chanflow::{channel, drain, CancellationToken, PipelineResult, Receiver};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default deadline for a pipeline test to finish.
pub const DEADLINE: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a fmt subscriber that writes through the test harness.
///
/// Respects `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(EnvFilter::from_default_env())
            .try_init();
    });
}

/// Await `fut`, failing the test if it takes longer than `limit`.
///
/// A pipeline that loses a wakeup or never closes an output shows up as a
/// timeout here instead of a hung test run.
pub async fn within<F: Future>(limit: Duration, fut: F) -> F::Output {
    match tokio::time::timeout(limit, fut).await {
        Ok(out) => out,
        Err(_) => panic!("timed out after {limit:?}, likely deadlock"),
    }
}

/// Drain `input` on its own task so several outputs can be consumed at once.
pub fn spawn_drain<T>(cancel: &CancellationToken, input: Receiver<T>) -> JoinHandle<PipelineResult<Vec<T>>>
where
    T: Send + 'static,
{
    let cancel = cancel.clone();
    tokio::spawn(async move { drain(&cancel, input).await })
}

/// A source that sends `items` one at a time, pausing `delay` before each.
///
/// The channel is a rendezvous channel, so the source also waits for a
/// reader. It closes after the last item, or early once `cancel` fires.
pub fn trickle<T>(cancel: &CancellationToken, items: Vec<T>, delay: Duration) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = channel(0);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        for item in items {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                sent = tx.send(item) => if sent.is_err() { return },
            }
        }
    });
    rx
}

/// A source that never closes on its own: it yields `items`, then holds the
/// channel open until the runtime shuts down.
pub fn endless<T>(items: Vec<T>) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = channel(0);
    tokio::spawn(async move {
        for item in items {
            if tx.send(item).await.is_err() {
                return;
            }
        }
        let _open = tx;
        std::future::pending::<()>().await;
    });
    rx
}

/// Sort a copy of `items`, for order-insensitive comparisons.
pub fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}
