//! Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};

/// Upper bound on either backlog. Larger values are almost certainly a unit
/// mistake; use `0` for unbounded.
pub const MAX_BACKLOG: usize = 1 << 20;

/// Upper bound on the worker pool size.
pub const MAX_WORKERS: usize = 4096;

/// Options for constructing an [`OrderedPipeline`](crate::OrderedPipeline).
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Number of concurrently executing workers.
    pub workers: usize,
    /// Maximum admitted-but-not-dispatched work items (`0` = unbounded).
    pub max_input_backlog: usize,
    /// Maximum ordered results waiting for the consumer (`0` = unbounded).
    pub max_output_backlog: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_input_backlog: 0,
            max_output_backlog: 0,
        }
    }
}

impl PipelineOptions {
    pub fn new(workers: usize, max_input_backlog: usize, max_output_backlog: usize) -> Self {
        Self {
            workers,
            max_input_backlog,
            max_output_backlog,
        }
    }

    /// Load options from a JSON file.
    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let options: Self = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        options.sanitize()?;
        Ok(options)
    }

    /// Validate options before any task is spawned.
    pub fn sanitize(&self) -> PipelineResult<()> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidArgument(
                "workers must be at least 1".into(),
            ));
        }
        if self.workers > MAX_WORKERS {
            return Err(PipelineError::InvalidArgument(format!(
                "workers must be at most {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        for (name, value) in [
            ("max_input_backlog", self.max_input_backlog),
            ("max_output_backlog", self.max_output_backlog),
        ] {
            if value > MAX_BACKLOG {
                return Err(PipelineError::InvalidArgument(format!(
                    "{} must be at most {} (0 = unbounded), got {}",
                    name, MAX_BACKLOG, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        let options = PipelineOptions::default();
        assert!(options.workers >= 1);
        assert_eq!(options.max_input_backlog, 0);
        assert_eq!(options.max_output_backlog, 0);
        options.sanitize().unwrap();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = PipelineOptions::new(0, 0, 0).sanitize();
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn test_oversized_backlog_rejected() {
        let result = PipelineOptions::new(2, MAX_BACKLOG + 1, 0).sanitize();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_input_backlog")
        );
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 3, "max_output_backlog": 16}}"#).unwrap();

        let options = PipelineOptions::from_json_file(file.path()).unwrap();
        assert_eq!(options, PipelineOptions::new(3, 0, 16));
    }

    #[test]
    fn test_from_json_file_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 2, "threads": 9}}"#).unwrap();

        let result = PipelineOptions::from_json_file(file.path());
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();

        let result = PipelineOptions::from_json_file(file.path());
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineOptions::from_json_file(Path::new("/nonexistent/options.json"));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
