use futures::Stream;

use super::handoff::HandoffReceiver;

/// Consumer side of a pipeline: results in admission order.
///
/// The stream ends (`recv` returns `None`) once the pipeline has been drained
/// and every result has been taken. Clones share the same stream; each result
/// goes to exactly one reader.
pub struct ResultStream<R> {
    rx: HandoffReceiver<R>,
}

impl<R> Clone for ResultStream<R> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<R> ResultStream<R> {
    pub(crate) fn new(rx: HandoffReceiver<R>) -> Self {
        Self { rx }
    }

    /// Wait for the next result. `None` means end-of-stream.
    pub async fn recv(&self) -> Option<R> {
        self.rx.recv().await
    }

    /// Take the next result only if one is ready right now.
    pub fn try_recv(&self) -> Option<R> {
        self.rx.try_recv()
    }

    /// `true` once the pipeline is drained and no result is pending.
    pub fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = R> {
        futures::stream::unfold(self, |results| async move {
            let next = results.recv().await?;
            Some((next, results))
        })
    }
}
