//! One-in, one-out transformation stages.
//!
//! All of them share [`pump`]: take an item, run the user function, forward
//! every value it yields. `map` yields exactly one value, `option_map` zero
//! or one, `flat_map` any number. With a worker pool, output order across
//! items is not preserved; every value is still forwarded exactly once.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{forward, next};
use crate::chan::Receiver;
use crate::config::StageConfig;
use crate::runtime::launch_one;

fn pump<S, T, I, F>(
    stage: &'static str,
    cancel: &CancellationToken,
    input: Receiver<S>,
    config: StageConfig,
    f: F,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
    F: Fn(&CancellationToken, S) -> I + Send + Sync + 'static,
{
    let f = Arc::new(f);
    launch_one(stage, cancel, config, move |cancel, out| {
        let input = input.clone();
        let f = Arc::clone(&f);
        async move {
            while let Some(item) = next(&cancel, &input).await {
                for value in (*f)(&cancel, item) {
                    if !forward(&cancel, &out, value).await {
                        return;
                    }
                }
            }
        }
    })
}

/// Apply `f` to every input item and send the result downstream.
///
/// The output closes when the input closes or `cancel` fires.
pub fn map<S, T, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S) -> T + Send + Sync + 'static,
{
    pump("map", cancel, input, config, move |_, item| Some(f(item)))
}

/// [`map`] where `f` also receives the pipeline's cancellation token.
pub fn map_with_cancel<S, T, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(&CancellationToken, S) -> T + Send + Sync + 'static,
{
    pump("map_with_cancel", cancel, input, config, move |cancel, item| {
        Some(f(cancel, item))
    })
}

/// Apply `f` to every input item and send each value it returns.
pub fn flat_map<S, T, I, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
    F: Fn(S) -> I + Send + Sync + 'static,
{
    pump("flat_map", cancel, input, config, move |_, item| f(item))
}

/// [`flat_map`] where `f` also receives the pipeline's cancellation token.
pub fn flat_map_with_cancel<S, T, I, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
    F: Fn(&CancellationToken, S) -> I + Send + Sync + 'static,
{
    pump("flat_map_with_cancel", cancel, input, config, f)
}

/// Turn a channel of collections into a channel of their elements.
pub fn flatten<I, T>(cancel: &CancellationToken, input: Receiver<I>, config: StageConfig) -> Receiver<T>
where
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send,
    T: Send + 'static,
{
    pump("flatten", cancel, input, config, |_, items| items)
}

/// Apply `f` to every input item and send only the `Some` results.
///
/// `None` is a filter decision, not an error; it is dropped silently.
pub fn option_map<S, T, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S) -> Option<T> + Send + Sync + 'static,
{
    pump("option_map", cancel, input, config, move |_, item| f(item))
}

/// [`option_map`] where `f` also receives the pipeline's cancellation token.
pub fn option_map_with_cancel<S, T, F>(
    cancel: &CancellationToken,
    input: Receiver<S>,
    f: F,
    config: StageConfig,
) -> Receiver<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(&CancellationToken, S) -> Option<T> + Send + Sync + 'static,
{
    pump("option_map_with_cancel", cancel, input, config, f)
}

/// Re-publish `input` unchanged, closing the output when `cancel` fires.
///
/// Binds a channel produced outside the pipeline to the pipeline's token.
pub fn with_cancel<T>(cancel: &CancellationToken, input: Receiver<T>, config: StageConfig) -> Receiver<T>
where
    T: Send + 'static,
{
    pump("with_cancel", cancel, input, config, |_, item| Some(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::{channel, from_iter};
    use crate::consume::drain;
    use std::time::Duration;

    #[tokio::test]
    async fn test_map_squares_in_order() {
        let cancel = CancellationToken::new();
        let out = map(&cancel, from_iter(vec![1, 2, 3, 4]), |x: i32| x * x, StageConfig::new());
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![1, 4, 9, 16]);
    }

    #[tokio::test]
    async fn test_map_changes_type() {
        let cancel = CancellationToken::new();
        let out = map(&cancel, from_iter(vec![1, 22]), |x: u32| x.to_string(), StageConfig::buffered(2));
        assert_eq!(drain(&cancel, out).await.unwrap(), vec!["1", "22"]);
    }

    #[tokio::test]
    async fn test_map_with_cancel_sees_token() {
        let cancel = CancellationToken::new();
        let out = map_with_cancel(
            &cancel,
            from_iter(vec![1, 2]),
            |token: &CancellationToken, x: i32| (token.is_cancelled(), x),
            StageConfig::new(),
        );
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![(false, 1), (false, 2)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pooled_map_keeps_every_item() {
        let cancel = CancellationToken::new();
        let out = map(&cancel, from_iter(0..200), |x: u32| x + 1, StageConfig::pooled(4));
        let mut got = drain(&cancel, out).await.unwrap();
        got.sort_unstable();
        assert_eq!(got, (1..=200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_flat_map_expands_in_order() {
        let cancel = CancellationToken::new();
        let out = flat_map(&cancel, from_iter(vec![1, 2, 3]), |n: usize| vec![n; n], StageConfig::new());
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![1, 2, 2, 3, 3, 3]);
    }

    #[tokio::test]
    async fn test_flat_map_with_cancel_empty_results() {
        let cancel = CancellationToken::new();
        let out = flat_map_with_cancel(
            &cancel,
            from_iter(vec![1, 2, 3]),
            |_: &CancellationToken, _: i32| Vec::<i32>::new(),
            StageConfig::new(),
        );
        assert!(drain(&cancel, out).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flatten_accepts_any_collection() {
        let cancel = CancellationToken::new();
        let input = from_iter(vec![vec!['a', 'b'], vec![], vec!['c']]);
        let out = flatten(&cancel, input, StageConfig::new());
        assert_eq!(drain(&cancel, out).await.unwrap(), vec!['a', 'b', 'c']);

        let input = from_iter(vec![Some(1), None, Some(3)]);
        let out = flatten(&cancel, input, StageConfig::new());
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_option_map_filters() {
        let cancel = CancellationToken::new();
        let out = option_map(
            &cancel,
            from_iter(1..=10),
            |x: i32| (x % 3 == 0).then_some(x * 10),
            StageConfig::new(),
        );
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![30, 60, 90]);
    }

    #[tokio::test]
    async fn test_option_map_with_cancel() {
        let cancel = CancellationToken::new();
        let out = option_map_with_cancel(
            &cancel,
            from_iter(vec!["1", "x", "3"]),
            |_: &CancellationToken, s: &str| s.parse::<u8>().ok(),
            StageConfig::new(),
        );
        assert_eq!(drain(&cancel, out).await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_with_cancel_closes_on_cancel() {
        let cancel = CancellationToken::new();
        // An input that never closes on its own.
        let (tx, rx) = channel(1);
        tx.send(1).await.unwrap();

        let out = with_cancel(&cancel, rx, StageConfig::new());
        assert_eq!(out.recv().await, Some(1));

        cancel.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(1), out.recv()).await;
        assert_eq!(closed.expect("output should close after cancel"), None);
        drop(tx);
    }

    #[tokio::test]
    async fn test_map_stops_when_output_dropped() {
        let cancel = CancellationToken::new();
        let (tx, rx) = channel::<u32>(0);
        let (out_config, done) = StageConfig::new().with_done();
        let out = map(&cancel, rx, |x| x, out_config);
        drop(out);

        // Nobody reads the output, so the stage gives up after its first item.
        tx.send(1).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), done.wait())
            .await
            .expect("stage should stop once its output is gone");
    }
}
