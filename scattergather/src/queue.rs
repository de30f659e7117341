//! Bounded FIFO queue with close-then-drain semantics.
//!
//! The pipeline uses two of these: one for admitted work and one for ordered
//! results. The contract it relies on:
//!
//! - `push` waits while the queue is at capacity and fails once the queue is
//!   closed; `push_cancellable` also gives up when the caller's token fires.
//! - `pop` waits while the queue is empty and open. It reports end-of-stream
//!   only when the queue is closed *and* empty, so closing never discards
//!   already-accepted items.
//! - `close` is idempotent.
//!
//! Capacity `0` means unbounded.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is closed (for pops: closed and fully drained).
    #[error("queue closed")]
    Closed,
    /// The cancellation token fired before the operation completed.
    #[error("queue operation cancelled")]
    Cancelled,
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => PipelineError::Closed,
            QueueError::Cancelled => PipelineError::Cancelled,
        }
    }
}

/// Multi-producer multi-consumer queue backed by `async-channel`.
///
/// Cloning yields another handle to the same queue.
pub struct BoundedQueue<T> {
    tx: async_channel::Sender<T>,
    rx: async_channel::Receiver<T>,
    capacity: usize,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (`0` = unbounded).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = if capacity == 0 {
            async_channel::unbounded()
        } else {
            async_channel::bounded(capacity)
        };
        Self { tx, rx, capacity }
    }

    /// Push an item, waiting for room if the queue is full.
    pub async fn push(&self, item: T) -> Result<(), QueueError> {
        self.tx.send(item).await.map_err(|_| QueueError::Closed)
    }

    /// Like [`push`](Self::push), but gives up when `cancel` fires.
    ///
    /// When room is available the push succeeds even if `cancel` has already
    /// fired; cancellation only interrupts a push that would wait.
    pub async fn push_cancellable(
        &self,
        cancel: &CancellationToken,
        item: T,
    ) -> Result<(), QueueError> {
        tokio::select! {
            biased;

            sent = self.tx.send(item) => sent.map_err(|_| QueueError::Closed),
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
        }
    }

    /// Pop the oldest item, waiting while the queue is empty and open.
    pub async fn pop(&self) -> Result<T, QueueError> {
        self.rx.recv().await.map_err(|_| QueueError::Closed)
    }

    /// Like [`pop`](Self::pop), but gives up when `cancel` fires.
    pub async fn pop_cancellable(&self, cancel: &CancellationToken) -> Result<T, QueueError> {
        tokio::select! {
            biased;

            item = self.rx.recv() => item.map_err(|_| QueueError::Closed),
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
        }
    }

    /// Stop accepting pushes. Buffered items stay poppable.
    pub fn close(&self) {
        self.tx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity (`0` = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
