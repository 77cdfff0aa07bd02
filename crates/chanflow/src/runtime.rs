//! Stage runtime: spawns stage bodies and closes their outputs exactly once.
//!
//! ```text
//!   launch(config) ──▶ make_outputs ──▶ body × workers ──▶ tokio::spawn
//!                                          │
//!        each worker holds a WorkerGuard ──┘
//!        guard drop: remaining -= 1
//!        remaining hits 0: close outputs, then fire Completion
//! ```
//!
//! The last worker to exit performs the close, whichever one that is. The
//! guard runs on normal return, on early return after cancellation, and
//! while unwinding from a panic, so outputs are never left open.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::chan::{Receiver, Sender};
use crate::completion::Completion;
use crate::config::StageConfig;

/// Shutdown state shared by the workers of one stage invocation.
struct Closer<T, const N: usize> {
    stage: &'static str,
    remaining: AtomicUsize,
    outputs: [Sender<T>; N],
    completion: Option<Completion>,
}

impl<T, const N: usize> Closer<T, N> {
    fn worker_exited(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        for out in &self.outputs {
            out.close();
        }
        tracing::trace!(stage = self.stage, outputs = self.outputs.len(), "outputs closed");
        if let Some(done) = &self.completion {
            done.complete();
        }
    }
}

struct WorkerGuard<T, const N: usize> {
    closer: Arc<Closer<T, N>>,
}

impl<T, const N: usize> Drop for WorkerGuard<T, N> {
    fn drop(&mut self) {
        tracing::debug!(stage = self.closer.stage, "worker finished");
        self.closer.worker_exited();
    }
}

/// Start `body` on the configured number of workers and return the
/// receiving ends of `N` fresh channels.
///
/// `body` is called once per worker, on the caller's task, with a clone of
/// the cancellation token and a clone of every output sender. The futures it
/// returns are spawned; this function never blocks.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub(crate) fn launch<T, const N: usize, F, Fut>(
    stage: &'static str,
    cancel: &CancellationToken,
    mut config: StageConfig,
    mut body: F,
) -> [Receiver<T>; N]
where
    T: Send + 'static,
    F: FnMut(CancellationToken, [Sender<T>; N]) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    if config.workers == 0 {
        tracing::warn!(stage, "pool size 0 requested, running one worker");
    }
    let workers = config.worker_count();
    let (senders, receivers) = config.make_outputs::<T, N>();

    let closer = Arc::new(Closer {
        stage,
        remaining: AtomicUsize::new(workers),
        outputs: senders.clone(),
        completion: config.take_completion(),
    });

    tracing::debug!(stage, workers, outputs = N, capacity = config.capacity, "launching stage");

    for worker in 0..workers {
        let guard = WorkerGuard {
            closer: Arc::clone(&closer),
        };
        let task = body(cancel.clone(), senders.clone());
        let span = tracing::debug_span!("stage", stage, worker);
        tokio::spawn(
            async move {
                let _guard = guard;
                task.await;
            }
            .instrument(span),
        );
    }

    receivers
}

/// [`launch`] for the common single-output stage.
pub(crate) fn launch_one<T, F, Fut>(
    stage: &'static str,
    cancel: &CancellationToken,
    config: StageConfig,
    mut body: F,
) -> Receiver<T>
where
    T: Send + 'static,
    F: FnMut(CancellationToken, Sender<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let [output] = launch::<T, 1, _, _>(stage, cancel, config, move |cancel, [out]| body(cancel, out));
    output
}

/// Collapse a pool request to a single coordinator for stages that need one.
pub(crate) fn single_worker(stage: &'static str, config: StageConfig) -> StageConfig {
    if config.workers > 1 {
        tracing::debug!(stage, requested = config.workers, "stage runs one coordinator, ignoring pool size");
    }
    config.with_pool(1)
}
