//! Pipeline errors.
//!
//! Stages never fail; they stop. The only reportable condition is a terminal
//! consumer whose cancellation token fired before its input closed. That
//! consumer still hands back whatever it accumulated, wrapped in
//! [`Interrupted`].

use std::fmt;

use thiserror::Error;

/// Result type for terminal consumers.
pub type PipelineResult<T> = Result<T, Interrupted<T>>;

/// Why a pipeline run did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The cancellation token fired before the input channel closed.
    #[error("pipeline cancelled before its input closed")]
    Cancelled,
}

/// A terminal consumer stopped early; carries the partial result.
///
/// Partial output is never thrown away. Callers that only care about the
/// failure can convert into [`PipelineError`] with `?`.
#[derive(Clone, PartialEq, Eq)]
pub struct Interrupted<T> {
    partial: T,
}

impl<T> Interrupted<T> {
    pub(crate) fn cancelled(partial: T) -> Self {
        Self { partial }
    }

    /// The cause, as a plain error value.
    pub fn error(&self) -> PipelineError {
        PipelineError::Cancelled
    }

    /// What was accumulated before cancellation.
    pub fn partial(&self) -> &T {
        &self.partial
    }

    pub fn into_partial(self) -> T {
        self.partial
    }
}

impl<T> fmt::Debug for Interrupted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupted")
            .field("error", &self.error())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Interrupted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error(), f)
    }
}

impl<T> std::error::Error for Interrupted<T> {}

impl<T> From<Interrupted<T>> for PipelineError {
    fn from(err: Interrupted<T>) -> Self {
        err.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_keeps_partial() {
        let err = Interrupted::cancelled(vec![1, 2, 3]);
        assert_eq!(err.partial(), &vec![1, 2, 3]);
        assert_eq!(err.error(), PipelineError::Cancelled);
        assert_eq!(err.to_string(), "pipeline cancelled before its input closed");
        assert_eq!(err.into_partial(), vec![1, 2, 3]);
    }

    #[test]
    fn test_interrupted_converts_with_question_mark() {
        fn run() -> Result<Vec<u8>, PipelineError> {
            let result: PipelineResult<Vec<u8>> = Err(Interrupted::cancelled(vec![4]));
            Ok(result?)
        }
        assert_eq!(run(), Err(PipelineError::Cancelled));
    }
}
