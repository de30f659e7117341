//! Ordered scatter-gather: run computations concurrently on a fixed worker
//! pool and receive their results strictly in submission order.
//!
//! ```no_run
//! use scattergather::{CancellationToken, OrderedPipeline};
//!
//! # async fn demo() -> scattergather::PipelineResult<()> {
//! let pipeline = OrderedPipeline::new(4, 64, 64)?;
//! let results = pipeline.results();
//! let consumer = tokio::spawn(async move {
//!     while let Some(line) = results.recv().await {
//!         println!("{line}");
//!     }
//! });
//!
//! let cancel = CancellationToken::new();
//! for n in 0..10u64 {
//!     pipeline.add_work(&cancel, move || format!("{n}² = {}", n * n)).await?;
//! }
//! pipeline.drain().await?;
//! consumer.await.ok();
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod queue;

pub use errors::{PipelineError, PipelineResult};
pub use logging::init_logging;
pub use options::PipelineOptions;
pub use pipeline::{OrderedPipeline, PipelineMetrics, ResultStream};
pub use queue::{BoundedQueue, QueueError};
pub use tokio_util::sync::CancellationToken;
