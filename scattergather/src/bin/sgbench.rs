//! sgbench: drive an ordered pipeline with randomly delayed jobs and check
//! that results come back in submission order.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use rand::Rng;

use scattergather::{CancellationToken, OrderedPipeline, PipelineOptions, init_logging};

#[derive(Debug, Parser)]
#[command(name = "sgbench", about = "Exercise an ordered scatter-gather pipeline")]
struct Args {
    /// Number of workers (defaults to the number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Number of jobs to submit.
    #[arg(long, default_value_t = 1000)]
    jobs: u64,

    /// Input queue capacity, 0 for unbounded.
    #[arg(long)]
    max_input_backlog: Option<usize>,

    /// Output queue capacity, 0 for unbounded.
    #[arg(long)]
    max_output_backlog: Option<usize>,

    /// Upper bound of the random per-job delay.
    #[arg(long, default_value_t = 5)]
    max_delay_ms: u64,

    /// JSON file with pipeline options. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> anyhow::Result<PipelineOptions> {
        let mut options = match &self.config {
            Some(path) => PipelineOptions::from_json_file(path)?,
            None => PipelineOptions::default(),
        };
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(backlog) = self.max_input_backlog {
            options.max_input_backlog = backlog;
        }
        if let Some(backlog) = self.max_output_backlog {
            options.max_output_backlog = backlog;
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    let options = args.options()?;
    tracing::info!(
        workers = options.workers,
        jobs = args.jobs,
        max_input_backlog = options.max_input_backlog,
        max_output_backlog = options.max_output_backlog,
        "starting benchmark"
    );

    let pipeline =
        OrderedPipeline::with_options(options).context("failed to start pipeline")?;
    let results = pipeline.results();
    let expected_jobs = args.jobs;
    let consumer = tokio::spawn(async move {
        let mut expected = 1;
        while let Some(job) = results.recv().await {
            if job != expected {
                bail!("result out of order: expected job {expected}, got {job}");
            }
            expected += 1;
        }
        if expected - 1 != expected_jobs {
            bail!("received {} of {} results", expected - 1, expected_jobs);
        }
        Ok::<(), anyhow::Error>(())
    });

    let start = Instant::now();
    let cancel = CancellationToken::new();
    for job in 1..=args.jobs {
        let delay = random_delay(args.max_delay_ms);
        pipeline
            .add_work(&cancel, move || {
                std::thread::sleep(delay);
                job
            })
            .await
            .with_context(|| format!("failed to submit job {job}"))?;
    }

    pipeline.drain().await.context("drain failed")?;
    consumer.await.context("consumer task failed")??;
    let elapsed = start.elapsed();

    let metrics = pipeline.metrics();
    println!("jobs:           {}", args.jobs);
    println!("elapsed:        {:.3}s", elapsed.as_secs_f64());
    println!(
        "throughput:     {:.1} jobs/s",
        args.jobs as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("admitted:       {}", metrics.work_admitted_total());
    println!("delivered:      {}", metrics.results_delivered_total());
    println!("panicked:       {}", metrics.worker_panics_total());
    println!("reorder peak:   {}", metrics.reorder_buffer_peak());

    Ok(())
}

fn random_delay(max_delay_ms: u64) -> Duration {
    if max_delay_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_delay_ms))
}
