//! chanflow: cancellation-aware concurrent pipelines over typed channels.
//!
//! This crate provides:
//!
//! - **Channels**: a multi-producer multi-consumer channel with rendezvous
//!   and buffered modes, plus pre-filled sources
//! - **Stages**: map, flat-map, filter-map, flatten, fan-in, fan-out and
//!   unbounded fork, each running on one or more spawned workers
//! - **Consumers**: drain, fold and reduce, the only operations that report
//!   cancellation as an error
//!
//! ```text
//!   from_iter ──▶ map ──▶ option_map ──▶ tee ──┬──▶ drain
//!                                              └──▶ reduce
//!
//!   every stage: (cancel, input, f, StageConfig) ──▶ output Receiver
//!   every wait:  select { cancellation, channel }
//!   last worker out closes the outputs, then fires the Completion
//! ```
//!
//! All stages share one [`CancellationToken`]. Firing it makes every stage
//! stop within a few suspension points and close its outputs; consumers then
//! return [`Interrupted`] with whatever they had collected.
//!
//! Stages spawn Tokio tasks, so they must be called from inside a runtime.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use chanflow::{drain, from_iter, map, CancellationToken, StageConfig};
//!
//! let cancel = CancellationToken::new();
//! let squares = map(&cancel, from_iter(vec![1, 2, 3, 4]), |x: i32| x * x, StageConfig::new());
//! assert_eq!(drain(&cancel, squares).await.unwrap(), vec![1, 4, 9, 16]);
//! # }
//! ```

pub mod chan;
pub mod completion;
pub mod config;
pub mod consume;
pub mod error;
mod runtime;
pub mod stage;

pub use tokio_util::sync::CancellationToken;

pub use chan::{channel, from_iter, Permit, Receiver, Sender};
pub use completion::Completion;
pub use config::StageConfig;
pub use consume::{drain, fold, reduce};
pub use error::{Interrupted, PipelineError, PipelineResult};
pub use stage::{
    combine, flat_map, flat_map_with_cancel, flatten, fork_map_with_cancel, map, map_with_cancel,
    option_map, option_map_with_cancel, tee, with_cancel,
};
