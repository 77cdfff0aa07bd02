//! Unbounded fork: one task per input item.

use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::chan::{Receiver, Sender};
use crate::config::StageConfig;
use crate::runtime::launch_one;

/// Spawn `f(cancel, item, output)` on a new task for every input item.
///
/// `f` sends its own results to the output sender it is handed, as many as
/// it likes, and must race those sends against the token it is given or it
/// can block shutdown forever.
///
/// The number of concurrently running forks is **not bounded**: one task is
/// spawned per item as fast as items arrive. Callers must limit the input
/// rate themselves.
///
/// The output closes only after the input loop has stopped (input closed or
/// `cancel` fired) and every fork has finished. A fork that panics is logged
/// and does not stop the stage.
pub fn fork_map_with_cancel<S, T, F, Fut>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(CancellationToken, S, Sender<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let f = Arc::new(f);
    launch_one("fork_map_with_cancel", cancel, config, move |cancel, out| {
        let input = input.clone();
        let f = Arc::clone(&f);
        async move {
            let mut forks = JoinSet::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    Some(joined) = forks.join_next(), if !forks.is_empty() => reap(joined),
                    item = input.recv() => match item {
                        Some(item) => {
                            let task = (*f)(cancel.clone(), item, out.clone());
                            forks.spawn(task.in_current_span());
                        }
                        None => break,
                    },
                }
            }

            tracing::debug!(pending = forks.len(), "input loop finished, joining forks");
            while let Some(joined) = forks.join_next().await {
                reap(joined);
            }
        }
    })
}

fn reap(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => tracing::warn!("forked task panicked: {}", e),
        Err(e) => tracing::debug!("forked task cancelled: {}", e),
    }
}
