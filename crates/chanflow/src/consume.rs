//! Terminal consumers: drive a pipeline to completion on the caller's task.
//!
//! These are the only operations that report failure. Each one reads until
//! its input closes (`Ok`) or the token fires (`Err`), and in the second case
//! hands back what it had accumulated so far.

use tokio_util::sync::CancellationToken;

use crate::chan::Receiver;
use crate::error::{Interrupted, PipelineResult};

/// Fold every input item into `init` with `f`.
///
/// Cancellation is checked before each receive, so a token that has already
/// fired wins over items that are ready to be read.
pub async fn fold<S, A, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    init: A,
    mut f: F,
) -> PipelineResult<A>
where
    F: FnMut(A, S) -> A,
{
    let mut acc = init;
    let mut seen = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(seen, "consumer cancelled before input closed");
                return Err(Interrupted::cancelled(acc));
            }
            item = input.recv() => match item {
                Some(item) => {
                    acc = f(acc, item);
                    seen += 1;
                }
                None => {
                    tracing::trace!(seen, "consumer input closed");
                    return Ok(acc);
                }
            },
        }
    }
}

/// [`fold`] seeded with `A::default()`.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use chanflow::{from_iter, reduce, CancellationToken};
///
/// let cancel = CancellationToken::new();
/// let total = reduce(&cancel, from_iter(1..=4), |acc: u32, x| acc + x).await;
/// assert_eq!(total.unwrap(), 10);
/// # }
/// ```
pub async fn reduce<S, A, F>(cancel: &CancellationToken, input: Receiver<S>, f: F) -> PipelineResult<A>
where
    A: Default,
    F: FnMut(A, S) -> A,
{
    fold(cancel, input, A::default(), f).await
}

/// Collect every input item, in arrival order.
pub async fn drain<T>(cancel: &CancellationToken, input: Receiver<T>) -> PipelineResult<Vec<T>> {
    fold(cancel, input, Vec::new(), |mut items, item| {
        items.push(item);
        items
    })
    .await
}
