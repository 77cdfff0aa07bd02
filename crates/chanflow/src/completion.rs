//! Completion signal for a stage invocation.

use tokio_util::sync::CancellationToken;

/// Fires once every task of a stage has stopped and its outputs are closed.
///
/// Obtained from [`StageConfig::with_done`](crate::StageConfig::with_done).
/// Clones observe the same signal. Once fired it stays fired.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    token: CancellationToken,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn complete(&self) {
        self.token.cancel();
    }

    /// Wait until the stage has fully shut down.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }
}
