//! Cancellation for background tasks.
//!
//! Built on `tokio_util::sync::CancellationToken`.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// End `stream` once `token` is cancelled.
pub(crate) fn until_cancelled<S>(
    token: &CancellationToken,
    stream: S,
) -> impl Stream<Item = S::Item> + Send + 'static
where
    S: Stream + Send + 'static,
{
    stream.take_until(token.clone().cancelled_owned())
}

/// Handle to a running publish task; cancelling stops future emissions.
///
/// Dropping the handle does not stop the task.
#[derive(Debug, Clone)]
pub struct Cancellable {
    token: CancellationToken,
}

impl Cancellable {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stop the task. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
