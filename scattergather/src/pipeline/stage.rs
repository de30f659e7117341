//! Stage loops run as tokio tasks by [`OrderedPipeline`](super::OrderedPipeline).
//!
//! Each stage exits when its upstream reports end-of-stream; none of them
//! closes anything it does not own. Closing the downstream link is left to
//! `drain`, which does it only after the stage has been joined.

use std::sync::Arc;

use super::handoff::{HandoffReceiver, HandoffSender};
use super::metrics::PipelineMetricsStorage;
use super::reorder::{ReorderBuffer, Slot};
use super::task::{WorkItem, WorkResult};
use crate::queue::BoundedQueue;

/// Names used in logs and shutdown errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageKind {
    Dispatcher,
    Worker,
    Reorder,
    Relay,
}

impl StageKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            StageKind::Dispatcher => "dispatcher",
            StageKind::Worker => "worker",
            StageKind::Reorder => "reorder",
            StageKind::Relay => "relay",
        }
    }
}

/// Move admitted work from the input queue to whichever worker is idle.
pub(crate) async fn run_dispatcher<R: Send + 'static>(
    input: BoundedQueue<WorkItem<R>>,
    dispatch: HandoffSender<WorkItem<R>>,
) {
    tracing::debug!(stage = StageKind::Dispatcher.name(), "stage started");

    while let Ok(item) = input.pop().await {
        let sequence = item.sequence;
        tracing::trace!(sequence, "dispatching work item");
        if dispatch.send(item).await.is_err() {
            tracing::error!(
                sequence,
                "dispatch handoff closed while dispatcher was running"
            );
            break;
        }
    }

    tracing::debug!(stage = StageKind::Dispatcher.name(), "stage exited");
}

/// Execute work items one at a time and hand results to the reorder stage.
///
/// Computations run on the blocking pool. A panicking computation is logged,
/// counted, and reported as skipped; the worker keeps serving.
pub(crate) async fn run_worker<R: Send + 'static>(
    worker: usize,
    dispatch: HandoffReceiver<WorkItem<R>>,
    completions: HandoffSender<WorkResult<R>>,
    skips: async_channel::Sender<u64>,
    metrics: Arc<PipelineMetricsStorage>,
) {
    tracing::debug!(stage = StageKind::Worker.name(), worker, "stage started");

    while let Some(WorkItem { sequence, compute }) = dispatch.recv().await {
        tracing::trace!(worker, sequence, "executing work item");

        match tokio::task::spawn_blocking(compute).await {
            Ok(value) => {
                metrics.increment_completed();
                if completions
                    .send(WorkResult { sequence, value })
                    .await
                    .is_err()
                {
                    tracing::error!(
                        worker,
                        sequence,
                        "completion handoff closed while worker was running"
                    );
                    break;
                }
            }
            Err(err) => {
                if err.is_panic() {
                    metrics.increment_worker_panics();
                    tracing::error!(worker, sequence, "work item panicked");
                } else {
                    tracing::warn!(worker, sequence, error = %err, "work item was cancelled");
                }
                let _ = skips.try_send(sequence);
            }
        }
    }

    tracing::debug!(stage = StageKind::Worker.name(), worker, "stage exited");
}

/// Release results into the output queue in ascending sequence order.
///
/// Sole owner of the reorder buffer. Pushing into a full output queue parks
/// this stage, which is how consumer backpressure reaches the workers.
pub(crate) async fn run_reorder<R: Send + 'static>(
    completions: HandoffReceiver<WorkResult<R>>,
    skips: async_channel::Receiver<u64>,
    output: BoundedQueue<R>,
    metrics: Arc<PipelineMetricsStorage>,
) {
    tracing::debug!(stage = StageKind::Reorder.name(), "stage started");

    let mut buffer = ReorderBuffer::new();

    loop {
        let (sequence, slot) = tokio::select! {
            completion = completions.recv() => match completion {
                Some(WorkResult { sequence, value }) => (sequence, Slot::Value(value)),
                None => break,
            },
            Ok(sequence) = skips.recv() => (sequence, Slot::Skipped),
        };

        if !buffer.insert(sequence, slot) {
            tracing::warn!(
                sequence,
                next_expected = buffer.next_expected(),
                "ignoring stale or duplicate sequence"
            );
            continue;
        }
        metrics.observe_reorder_depth(buffer.len());

        if !release_ready(&mut buffer, &output).await {
            return;
        }
    }

    // Admissions that failed while shutdown was underway may still report.
    while let Ok(sequence) = skips.try_recv() {
        buffer.insert(sequence, Slot::Skipped);
    }
    if !release_ready(&mut buffer, &output).await {
        return;
    }

    if !buffer.is_empty() {
        let stranded = buffer.drain_remaining();
        tracing::warn!(
            count = stranded.len(),
            "releasing results stranded behind missing sequences"
        );
        for (sequence, value) in stranded {
            tracing::trace!(sequence, "releasing stranded result");
            if output.push(value).await.is_err() {
                tracing::error!(
                    sequence,
                    "output queue closed while reorder stage was running"
                );
                return;
            }
        }
    }

    tracing::debug!(stage = StageKind::Reorder.name(), "stage exited");
}

/// Push every contiguous ready slot. Returns `false` if the output queue closed.
async fn release_ready<R>(buffer: &mut ReorderBuffer<R>, output: &BoundedQueue<R>) -> bool {
    while let Some(slot) = buffer.pop_next() {
        let sequence = buffer.next_expected() - 1;
        match slot {
            Slot::Value(value) => {
                tracing::trace!(sequence, "releasing result");
                if output.push(value).await.is_err() {
                    tracing::error!(
                        sequence,
                        "output queue closed while reorder stage was running"
                    );
                    return false;
                }
            }
            Slot::Skipped => tracing::debug!(sequence, "skipping sequence with no result"),
        }
    }
    true
}

/// Forward ordered results to the consumer-facing handoff.
pub(crate) async fn run_relay<R: Send + 'static>(
    output: BoundedQueue<R>,
    results: HandoffSender<R>,
    metrics: Arc<PipelineMetricsStorage>,
) {
    tracing::debug!(stage = StageKind::Relay.name(), "stage started");

    while let Ok(value) = output.pop().await {
        if results.send(value).await.is_err() {
            tracing::error!("result handoff closed while relay was running");
            break;
        }
        metrics.increment_delivered();
    }

    tracing::debug!(stage = StageKind::Relay.name(), "stage exited");
}
