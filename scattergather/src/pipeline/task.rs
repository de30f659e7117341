//! Units of work flowing through the pipeline.

/// Zero-argument computation producing a result of type `R`.
pub(crate) type BoxedWork<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// Admitted work, tagged with its admission sequence number.
pub(crate) struct WorkItem<R> {
    pub(crate) sequence: u64,
    pub(crate) compute: BoxedWork<R>,
}

impl<R> WorkItem<R> {
    pub(crate) fn new<F>(sequence: u64, compute: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            sequence,
            compute: Box::new(compute),
        }
    }
}

/// Output of one executed work item.
#[derive(Debug)]
pub(crate) struct WorkResult<R> {
    pub(crate) sequence: u64,
    pub(crate) value: R,
}
