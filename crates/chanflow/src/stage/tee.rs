//! Fan-out: copy every input item onto two outputs.

use tokio_util::sync::CancellationToken;

use super::{forward, next};
use crate::chan::{Permit, Receiver, SendError, Sender};
use crate::config::StageConfig;
use crate::runtime::{launch, single_worker};

/// Send every input item to both returned receivers, in input order.
///
/// Each item is offered to whichever output is ready first, then sent to the
/// other one before the next item is read, so consumers may drain the two
/// sides in any order. Both sides must keep draining: a side that stops
/// reading (without being dropped) blocks the stage until `cancel` fires.
/// A side whose receivers are all dropped is skipped; the stage stops once
/// both sides are gone.
pub fn tee<T>(
    cancel: &CancellationToken,
    input: Receiver<T>,
    config: StageConfig,
) -> (Receiver<T>, Receiver<T>)
where
    T: Clone + Send + 'static,
{
    let config = single_worker("tee", config);
    let outputs = launch::<T, 2, _, _>("tee", cancel, config, move |cancel, outs: [Sender<T>; 2]| {
        let input = input.clone();
        async move {
            let [left, right] = &outs;
            while let Some(item) = next(&cancel, &input).await {
                if !deliver_both(&cancel, left, right, item).await {
                    return;
                }
            }
        }
    });

    let [left, right] = outputs;
    (left, right)
}

/// Deliver `item` to both outputs. Returns `false` when the stage should
/// stop: cancelled, or neither output could take the item.
async fn deliver_both<T: Clone>(
    cancel: &CancellationToken,
    left: &Sender<T>,
    right: &Sender<T>,
    item: T,
) -> bool {
    let (first, remaining) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return false,
        permit = left.reserve() => (offer(permit, &item), right),
        permit = right.reserve() => (offer(permit, &item), left),
    };
    let second = forward(cancel, remaining, item).await;
    if cancel.is_cancelled() {
        return false;
    }
    first || second
}

fn offer<T: Clone>(permit: Result<Permit<'_, T>, SendError<()>>, item: &T) -> bool {
    match permit {
        Ok(permit) => {
            permit.send(item.clone());
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::{channel, from_iter};
    use crate::consume::drain;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tee_both_sides_get_everything() {
        let cancel = CancellationToken::new();
        let (left, right) = tee(&cancel, from_iter(vec![5, 6]), StageConfig::new());

        let (left, right) = tokio::join!(drain(&cancel, left), drain(&cancel, right));
        assert_eq!(left.unwrap(), vec![5, 6]);
        assert_eq!(right.unwrap(), vec![5, 6]);
    }

    /// Draining the right side first must not deadlock.
    #[tokio::test]
    async fn test_tee_either_consumer_may_lead() {
        let cancel = CancellationToken::new();
        let (left, right) = tee(&cancel, from_iter(0..20), StageConfig::new());

        let right_task = tokio::spawn({
            let cancel = cancel.clone();
            async move { drain(&cancel, right).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let left = drain(&cancel, left).await.unwrap();
        let right = right_task.await.unwrap().unwrap();

        assert_eq!(left, (0..20).collect::<Vec<_>>());
        assert_eq!(right, left);
    }

    #[tokio::test]
    async fn test_tee_blocks_until_cancel_when_one_side_idle() {
        let cancel = CancellationToken::new();
        let (config, done) = StageConfig::new().with_done();
        let (left, _right) = tee(&cancel, from_iter(vec![1, 2, 3]), config);

        // Only the left side is read; the stage stalls on the right.
        assert_eq!(left.recv().await, Some(1));
        let stalled = tokio::time::timeout(Duration::from_millis(20), left.recv()).await;
        assert!(stalled.is_err(), "tee should wait for the idle side");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), done.wait())
            .await
            .expect("tee should stop after cancel");
    }

    #[tokio::test]
    async fn test_tee_feeds_survivor_when_one_side_dropped() {
        let cancel = CancellationToken::new();
        let (left, right) = tee(&cancel, from_iter(vec!['x', 'y', 'z']), StageConfig::new());
        drop(right);
        assert_eq!(drain(&cancel, left).await.unwrap(), vec!['x', 'y', 'z']);
    }

    #[tokio::test]
    async fn test_tee_stops_when_both_sides_dropped() {
        let cancel = CancellationToken::new();
        let (tx, rx) = channel::<u8>(0);
        let (config, done) = StageConfig::new().with_done();
        let (left, right) = tee(&cancel, rx, config);
        drop(left);
        drop(right);

        tx.send(1).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), done.wait())
            .await
            .expect("tee should stop with no consumers");
    }
}
