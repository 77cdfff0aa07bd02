//! Pipeline stages.
//!
//! Each stage takes a cancellation token, one or more input receivers, and a
//! [`StageConfig`](crate::StageConfig), spawns its workers and returns the
//! output receiver(s) immediately:
//!
//! ```text
//!   input ──▶ map / flat_map / option_map / flatten / with_cancel ──▶ output
//!   left  ──┐
//!           ├──▶ combine ──▶ output
//!   right ──┘
//!   input ──▶ tee ──┬──▶ left
//!                   └──▶ right
//!   input ──▶ fork_map_with_cancel ──▶ (one task per item) ──▶ output
//! ```
//!
//! Every blocking point inside a stage waits on the data channel and the
//! cancellation token together, with cancellation checked first. A stage
//! that sees cancellation, a closed input, or a fully disconnected output
//! simply returns; the runtime then closes its outputs.

mod combine;
mod fork;
mod tee;
mod transform;

pub use combine::combine;
pub use fork::fork_map_with_cancel;
pub use tee::tee;
pub use transform::{
    flat_map, flat_map_with_cancel, flatten, map, map_with_cancel, option_map,
    option_map_with_cancel, with_cancel,
};

use tokio_util::sync::CancellationToken;

use crate::chan::{Receiver, Sender};

/// Receive the next input item, or `None` on close or cancellation.
pub(crate) async fn next<T>(cancel: &CancellationToken, input: &Receiver<T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = input.recv() => item,
    }
}

/// Send `item` downstream. Returns `false` if the stage should stop, either
/// because of cancellation or because nobody can receive any more.
pub(crate) async fn forward<T>(cancel: &CancellationToken, out: &Sender<T>, item: T) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = out.send(item) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::{channel, from_iter};
    use std::time::Duration;

    #[tokio::test]
    async fn test_next_prefers_cancellation() {
        let cancel = CancellationToken::new();
        let input = from_iter(vec![1, 2]);
        assert_eq!(next(&cancel, &input).await, Some(1));

        cancel.cancel();
        assert_eq!(next(&cancel, &input).await, None);
        // The item is still there for someone else.
        assert_eq!(input.len(), 1);
    }

    #[tokio::test]
    async fn test_forward_unblocks_on_cancel() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = channel::<u8>(0);

        let sender = tokio::spawn({
            let cancel = cancel.clone();
            async move { forward(&cancel, &tx, 1).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), sender).await;
        assert!(!result.expect("forward hung after cancel").unwrap());
    }

    #[tokio::test]
    async fn test_forward_reports_disconnect() {
        let cancel = CancellationToken::new();
        let (tx, rx) = channel::<u8>(1);
        drop(rx);
        assert!(!forward(&cancel, &tx, 1).await);
    }
}
