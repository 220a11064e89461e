use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ClientError;

/// A caller-held abort signal. Clones share the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        CancellationToken {
            sender: Arc::new(sender),
        }
    }

    /// Aborts every in-flight leg racing this token. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `future` unless `token` fires first. The token is polled first, so a
/// token cancelled before the call never lets the future start.
pub async fn run_cancellable<F, T>(
    token: Option<&CancellationToken>,
    future: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match token {
        None => future.await,
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ClientError::Cancelled),
                result = future => result,
            }
        }
    }
}
