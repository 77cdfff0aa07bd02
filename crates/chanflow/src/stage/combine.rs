//! Fan-in: merge two inputs into one output.

use tokio_util::sync::CancellationToken;

use super::forward;
use crate::chan::Receiver;
use crate::config::StageConfig;
use crate::runtime::{launch_one, single_worker};

/// Forward every item from `left` and `right` to one output.
///
/// Runs a single coordinator regardless of the configured pool size. When
/// one input closes it is never polled again; the output closes once both
/// inputs have closed or `cancel` fires. Items keep their order within each
/// input; the interleaving between the two is whichever is ready first.
pub fn combine<T>(
    cancel: &CancellationToken,
    left: Receiver<T>,
    right: Receiver<T>,
    config: StageConfig,
) -> Receiver<T>
where
    T: Send + 'static,
{
    let config = single_worker("combine", config);
    launch_one("combine", cancel, config, move |cancel, out| {
        let mut left = Some(left.clone());
        let mut right = Some(right.clone());
        async move {
            while left.is_some() || right.is_some() {
                // The race below is unbiased so neither input starves, which
                // means cancellation has to be checked up front.
                if cancel.is_cancelled() {
                    return;
                }
                let item = tokio::select! {
                    _ = cancel.cancelled() => return,
                    item = recv_from(&left) => match item {
                        Some(item) => item,
                        None => {
                            tracing::trace!("left input closed");
                            left = None;
                            continue;
                        }
                    },
                    item = recv_from(&right) => match item {
                        Some(item) => item,
                        None => {
                            tracing::trace!("right input closed");
                            right = None;
                            continue;
                        }
                    },
                };
                if !forward(&cancel, &out, item).await {
                    return;
                }
            }
        }
    })
}

/// Receive from an input that may already be retired; a retired input never
/// yields.
async fn recv_from<T>(input: &Option<Receiver<T>>) -> Option<T> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
