//! Ordered scatter-gather pipeline.
//!
//! Work is admitted in order, executed concurrently by a fixed worker pool,
//! and handed back to the consumer in admission order.
//!
//! ## Architecture
//!
//! ```text
//! add_work ─► input queue ─► Dispatcher ─┬─► Worker ─┐
//!                                        ├─► Worker ─┼─► Reorder ─► output queue ─► Relay ─► ResultStream
//!                                        └─► Worker ─┘
//!
//! - Input/output queue: bounded (or unbounded) FIFO, close-then-drain
//! - Dispatcher → Worker, Worker → Reorder, Relay → consumer: zero-buffer handoffs
//! - Reorder: single task owning the sparse reorder buffer
//! ```
//!
//! Every link blocks when its downstream is full, so a consumer that stops
//! reading eventually blocks `add_work`.
//!
//! ## Shutdown
//!
//! `drain` closes the input queue, then joins each stage in turn and closes
//! the link behind it only once nothing can send on it any more:
//!
//! ```text
//! 1. close input queue
//! 2. join Dispatcher  → close dispatch handoff
//! 3. join Workers     → close completion handoff
//! 4. join Reorder     → close output queue
//! 5. join Relay       → close result handoff
//! ```

mod handoff;
mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod reorder;
mod results;
mod stage;
mod task;

pub use metrics::PipelineMetrics;
pub use pipeline::OrderedPipeline;
pub use results::ResultStream;
