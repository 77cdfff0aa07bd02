//! Per-invocation stage configuration.
//!
//! A [`StageConfig`] is built once per stage call and consumed by it:
//!
//! | Setting | Default | Meaning |
//! |---------|---------|---------|
//! | `capacity` | 0 | Output buffer size; 0 is a rendezvous channel |
//! | `workers` | 1 | Concurrent copies of the stage body |
//! | completion | none | [`Completion`] fired after full shutdown |
//!
//! The numeric settings (de)serialize with serde, so they can come from a
//! configuration file:
//!
//! ```
//! use chanflow::StageConfig;
//!
//! let config: StageConfig = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
//! assert_eq!(config.workers, 4);
//! assert_eq!(config.capacity, 0);
//! ```

use serde::{Deserialize, Serialize};

use crate::chan::{channel, Receiver, Sender};
use crate::completion::Completion;

/// Options for a single stage invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Buffer size of each output channel. 0 means rendezvous.
    pub capacity: usize,

    /// Number of concurrent workers running the stage body.
    ///
    /// Values below 1 are treated as 1. Stages that need a single
    /// coordinator (`combine`, `tee`) ignore this.
    pub workers: usize,

    #[serde(skip)]
    completion: Option<Completion>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            workers: 1,
            completion: None,
        }
    }
}

impl StageConfig {
    /// Rendezvous output, one worker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered output of the given size, one worker.
    pub fn buffered(capacity: usize) -> Self {
        Self::default().with_buffer(capacity)
    }

    /// Rendezvous output, `workers` concurrent workers.
    pub fn pooled(workers: usize) -> Self {
        Self::default().with_pool(workers)
    }

    /// Set the output buffer size.
    pub fn with_buffer(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Run the stage body on a pool of workers.
    ///
    /// All workers stay alive until the input closes or the pipeline is
    /// cancelled. Output order across items is no longer guaranteed.
    pub fn with_pool(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Attach a completion signal that fires once the stage has shut down.
    ///
    /// Use a fresh signal per stage; a config cloned into several stages
    /// would share it.
    pub fn with_done(mut self) -> (Self, Completion) {
        let done = Completion::new();
        self.completion = Some(done.clone());
        (self, done)
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    pub(crate) fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Allocate `N` output channels with the configured capacity.
    pub(crate) fn make_outputs<T, const N: usize>(&self) -> ([Sender<T>; N], [Receiver<T>; N]) {
        let channels: [(Sender<T>, Receiver<T>); N] = std::array::from_fn(|_| channel(self.capacity));
        let senders = std::array::from_fn(|i| channels[i].0.clone());
        let receivers = channels.map(|(_, rx)| rx);
        (senders, receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StageConfig::default();
        assert_eq!(config.capacity, 0);
        assert_eq!(config.workers, 1);
        assert!(config.completion.is_none());
    }

    #[test]
    fn test_builders() {
        let config = StageConfig::buffered(8).with_pool(3);
        assert_eq!(config.capacity, 8);
        assert_eq!(config.workers, 3);

        let config = StageConfig::pooled(2);
        assert_eq!(config.capacity, 0);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_zero_workers_clamps_to_one() {
        assert_eq!(StageConfig::pooled(0).worker_count(), 1);
        assert_eq!(StageConfig::pooled(5).worker_count(), 5);
    }

    #[test]
    fn test_with_done_attaches_shared_signal() {
        let (mut config, done) = StageConfig::new().with_done();
        let attached = config.take_completion().expect("completion attached");
        attached.complete();
        assert!(done.is_complete());
        assert!(config.take_completion().is_none());
    }

    #[test]
    fn test_make_outputs_uses_capacity() {
        let config = StageConfig::buffered(3);
        let (senders, receivers) = config.make_outputs::<u8, 2>();
        assert!(senders.iter().all(|tx| !tx.is_closed()));
        assert!(receivers.iter().all(|rx| rx.capacity() == 3));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: StageConfig = serde_json::from_str(r#"{"capacity": 16}"#).unwrap();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.workers, 1);
        assert!(config.completion.is_none());
    }

    #[test]
    fn test_serialize_skips_completion() {
        let (config, _done) = StageConfig::pooled(4).with_done();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"capacity": 0, "workers": 4}));
    }
}
