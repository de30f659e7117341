//! The ordered scatter-gather pipeline object.
//!
//! Owns both queues, the sequence counter, every inter-stage link, and the
//! join handles of the stage tasks. Lifecycle:
//!
//! ```text
//! constructed ──► accepting ──drain()──► draining ──► terminated
//! (stages run)    (add_work)             (no admissions) (all tasks joined)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::handoff::{HandoffSender, handoff};
use super::metrics::{PipelineMetrics, PipelineMetricsStorage};
use super::reorder::FIRST_SEQUENCE;
use super::results::ResultStream;
use super::stage::{StageKind, run_dispatcher, run_relay, run_reorder, run_worker};
use super::task::{WorkItem, WorkResult};
use crate::errors::{PipelineError, PipelineResult};
use crate::options::PipelineOptions;
use crate::queue::BoundedQueue;

/// Runs computations concurrently and yields their results in admission order.
///
/// All stages start at construction. Call [`drain`](Self::drain) to shut the
/// pipeline down; dropping it without draining aborts the stage tasks and
/// discards work that has not been delivered.
///
/// Computations are expected to encode their own failures in `R`. A panic in
/// one does not abort the process or kill its worker: the panic is caught,
/// that sequence produces no result, later results keep flowing, and `drain`
/// reports [`PipelineError::WorkerPanicked`] once shutdown is complete.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> scattergather::PipelineResult<()> {
/// use scattergather::{CancellationToken, OrderedPipeline};
///
/// let pipeline = OrderedPipeline::new(4, 0, 0)?;
/// let cancel = CancellationToken::new();
/// for i in 1..=3u32 {
///     pipeline.add_work(&cancel, move || i * 10).await?;
/// }
///
/// let results = pipeline.results();
/// let consumer = tokio::spawn(async move {
///     let mut seen = Vec::new();
///     while let Some(value) = results.recv().await {
///         seen.push(value);
///     }
///     seen
/// });
///
/// pipeline.drain().await?;
/// assert_eq!(consumer.await.unwrap(), vec![10, 20, 30]);
/// # Ok(())
/// # }
/// ```
pub struct OrderedPipeline<R: Send + 'static> {
    input: BoundedQueue<WorkItem<R>>,
    output: BoundedQueue<R>,
    dispatch_tx: HandoffSender<WorkItem<R>>,
    completion_tx: HandoffSender<WorkResult<R>>,
    results_tx: HandoffSender<R>,
    results: ResultStream<R>,
    skips_tx: async_channel::Sender<u64>,
    last_sequence: AtomicU64,
    metrics: Arc<PipelineMetricsStorage>,
    stages: Mutex<StageState>,
}

/// Stage tasks not yet joined, plus the drain outcome once shutdown is done.
///
/// A handle is removed only after its task has been joined, so a `drain`
/// abandoned part-way leaves the rest in place for the next call.
struct StageState {
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    reorder: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
    failures: Vec<String>,
    outcome: Option<PipelineResult<()>>,
}

impl StageState {
    fn abort_all(&self) {
        let singles = [&self.dispatcher, &self.reorder, &self.relay];
        for handle in singles.into_iter().flatten().chain(&self.workers) {
            handle.abort();
        }
    }

    fn record(&mut self, stage: StageKind, joined: Result<(), JoinError>) {
        if let Err(err) = joined {
            tracing::error!(stage = stage.name(), error = %err, "stage task failed");
            self.failures
                .push(format!("{} task failed: {}", stage.name(), err));
        }
    }
}

/// Join the task in `slot`, clearing the slot only once the join completed.
async fn join_slot(slot: &mut Option<JoinHandle<()>>) -> Option<Result<(), JoinError>> {
    let handle = slot.as_mut()?;
    let joined = handle.await;
    *slot = None;
    Some(joined)
}

impl<R: Send + 'static> OrderedPipeline<R> {
    /// Start a pipeline with `workers` workers.
    ///
    /// `0` for either backlog means unbounded. Must be called from within a
    /// tokio runtime.
    pub fn new(
        workers: usize,
        max_input_backlog: usize,
        max_output_backlog: usize,
    ) -> PipelineResult<Self> {
        Self::with_options(PipelineOptions::new(
            workers,
            max_input_backlog,
            max_output_backlog,
        ))
    }

    /// Start a pipeline from validated options.
    pub fn with_options(options: PipelineOptions) -> PipelineResult<Self> {
        options.sanitize()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let input = BoundedQueue::new(options.max_input_backlog);
        let output = BoundedQueue::new(options.max_output_backlog);
        let (dispatch_tx, dispatch_rx) = handoff();
        let (completion_tx, completion_rx) = handoff();
        let (results_tx, results_rx) = handoff();
        let (skips_tx, skips_rx) = async_channel::unbounded();
        let metrics = Arc::new(PipelineMetricsStorage::new());

        let workers: Vec<_> = (0..options.workers)
            .map(|worker| {
                runtime.spawn(run_worker(
                    worker,
                    dispatch_rx.clone(),
                    completion_tx.clone(),
                    skips_tx.clone(),
                    Arc::clone(&metrics),
                ))
            })
            .collect();
        let dispatcher = runtime.spawn(run_dispatcher(input.clone(), dispatch_tx.clone()));
        let reorder = runtime.spawn(run_reorder(
            completion_rx,
            skips_rx,
            output.clone(),
            Arc::clone(&metrics),
        ));
        let relay = runtime.spawn(run_relay(
            output.clone(),
            results_tx.clone(),
            Arc::clone(&metrics),
        ));

        tracing::debug!(
            workers = options.workers,
            max_input_backlog = options.max_input_backlog,
            max_output_backlog = options.max_output_backlog,
            "started ordered pipeline"
        );

        Ok(Self {
            input,
            output,
            dispatch_tx,
            completion_tx,
            results_tx,
            results: ResultStream::new(results_rx),
            skips_tx,
            last_sequence: AtomicU64::new(FIRST_SEQUENCE - 1),
            metrics,
            stages: Mutex::new(StageState {
                dispatcher: Some(dispatcher),
                workers,
                reorder: Some(reorder),
                relay: Some(relay),
                failures: Vec::new(),
                outcome: None,
            }),
        })
    }

    /// Admit a computation and return its sequence number.
    ///
    /// Waits while the input queue is full. If `cancel` fires during that wait
    /// the call returns [`PipelineError::Cancelled`]; after `drain` has begun it
    /// returns [`PipelineError::Closed`]. In both cases (and if this future is
    /// dropped before admission) the sequence number is reported as skipped so
    /// that later results are not held back waiting for it.
    ///
    /// For a single caller admitting sequentially, results come out in call
    /// order. Concurrent callers are ordered by who won the sequence counter.
    pub async fn add_work<F>(
        &self,
        cancel: &CancellationToken,
        compute: F,
    ) -> PipelineResult<u64>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut guard = AdmissionGuard::new(sequence, &self.skips_tx, &self.metrics);

        match self
            .input
            .push_cancellable(cancel, WorkItem::new(sequence, compute))
            .await
        {
            Ok(()) => {
                guard.disarm();
                self.metrics.increment_admitted();
                tracing::trace!(sequence, "admitted work item");
                Ok(sequence)
            }
            Err(err) => {
                tracing::debug!(sequence, error = %err, "work item not admitted");
                Err(err.into())
            }
        }
    }

    /// Results in admission order. Every call returns a handle to the same
    /// stream.
    pub fn results(&self) -> ResultStream<R> {
        self.results.clone()
    }

    /// Snapshot of the pipeline counters.
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.snapshot()
    }

    /// `true` once `drain` has begun.
    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }

    /// Stop accepting work, finish everything already admitted, and release
    /// all stage tasks.
    ///
    /// Returns only after the last result has been taken from the result
    /// stream, so some consumer must keep reading while this runs. Safe to
    /// call more than once: later calls wait for the first to finish and
    /// return its outcome.
    ///
    /// Returns [`PipelineError::WorkerPanicked`] if any computation panicked;
    /// shutdown is complete even then. A `drain` future dropped part-way
    /// leaves the pipeline closed; the next call resumes the shutdown where
    /// it stopped.
    pub async fn drain(&self) -> PipelineResult<()> {
        let mut state = self.stages.lock().await;
        if let Some(outcome) = &state.outcome {
            return outcome.clone();
        }

        let outcome = self.shutdown(&mut state).await;
        state.outcome = Some(outcome.clone());
        outcome
    }

    /// Five-step barrier: each link is closed only after every task that
    /// could still send on it has exited. Every step is safe to repeat.
    async fn shutdown(&self, state: &mut StageState) -> PipelineResult<()> {
        tracing::debug!("drain: closing input queue");
        self.input.close();

        if let Some(joined) = join_slot(&mut state.dispatcher).await {
            state.record(StageKind::Dispatcher, joined);
        }
        self.dispatch_tx.close();
        tracing::debug!("drain: dispatcher finished");

        while let Some(worker) = state.workers.last_mut() {
            let joined = worker.await;
            state.workers.pop();
            state.record(StageKind::Worker, joined);
        }
        self.completion_tx.close();
        tracing::debug!("drain: workers finished");

        if let Some(joined) = join_slot(&mut state.reorder).await {
            state.record(StageKind::Reorder, joined);
        }
        self.output.close();
        tracing::debug!("drain: reorder stage finished");

        if let Some(joined) = join_slot(&mut state.relay).await {
            state.record(StageKind::Relay, joined);
        }
        self.results_tx.close();

        let metrics = self.metrics.snapshot();
        tracing::info!(
            admitted = metrics.work_admitted_total(),
            delivered = metrics.results_delivered_total(),
            panicked = metrics.worker_panics_total(),
            "pipeline drained"
        );

        if !state.failures.is_empty() {
            return Err(PipelineError::Internal(state.failures.join("; ")));
        }
        match self.metrics.worker_panics() {
            0 => Ok(()),
            count => Err(PipelineError::WorkerPanicked { count }),
        }
    }
}

impl<R: Send + 'static> Drop for OrderedPipeline<R> {
    fn drop(&mut self) {
        let state = self.stages.get_mut();
        if state.outcome.is_none() {
            tracing::warn!(
                in_flight = self.metrics.snapshot().in_flight(),
                "OrderedPipeline dropped without drain(), aborting stage tasks"
            );
            self.input.close();
            self.output.close();
            self.results_tx.close();
            state.abort_all();
        }
    }
}

/// Reports a sequence as skipped unless admission succeeded.
///
/// Covers failed pushes and `add_work` futures dropped mid-wait alike.
struct AdmissionGuard<'a> {
    sequence: u64,
    skips: &'a async_channel::Sender<u64>,
    metrics: &'a PipelineMetricsStorage,
    armed: bool,
}

impl<'a> AdmissionGuard<'a> {
    fn new(
        sequence: u64,
        skips: &'a async_channel::Sender<u64>,
        metrics: &'a PipelineMetricsStorage,
    ) -> Self {
        Self {
            sequence,
            skips,
            metrics,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.metrics.increment_rejected();
            let _ = self.skips.try_send(self.sequence);
        }
    }
}
