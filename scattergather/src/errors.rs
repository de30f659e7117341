//! Error types for the scatter-gather pipeline.
//!
//! Only two conditions reach callers during normal operation: an admission
//! that was cancelled while waiting for input capacity, and an admission made
//! after the pipeline started draining. The remaining variants cover
//! construction, configuration, and faults raised by work computations.

use thiserror::Error;

/// Errors surfaced by [`OrderedPipeline`](crate::OrderedPipeline) and its helpers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// `add_work` was cancelled while waiting for room in the input queue.
    /// The work item was never admitted.
    #[error("admission cancelled while waiting for input capacity")]
    Cancelled,

    /// `add_work` was called after `drain` began.
    #[error("pipeline is closed, no new work accepted")]
    Closed,

    /// Construction arguments were rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pipeline was constructed outside a tokio runtime.
    #[error("no tokio runtime available, pipeline must be created inside a runtime")]
    NoRuntime,

    /// One or more computations panicked. Reported by `drain` once shutdown
    /// has fully completed.
    #[error("{count} work item(s) panicked during execution")]
    WorkerPanicked { count: u64 },

    /// Options or logging could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pipeline stage task terminated abnormally.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
