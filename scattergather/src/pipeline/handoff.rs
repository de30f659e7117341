//! Zero-buffer handoff between pipeline stages.
//!
//! A send completes only after some receiver has taken the item, so a stage
//! cannot run ahead of its consumers. With several receivers, whichever one
//! is idle takes the next item.
//!
//! Built from a one-slot `async-channel` plus a per-item acknowledgement: the
//! slot lets exactly one sender park its item, and the sender then waits for
//! the receiver's ack.

use tokio::sync::oneshot;

type Envelope<T> = (T, oneshot::Sender<()>);

/// Returned when the handoff was closed before a receiver took the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HandoffClosed;

pub(crate) fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = async_channel::bounded(1);
    (HandoffSender { tx }, HandoffReceiver { rx })
}

pub(crate) struct HandoffSender<T> {
    tx: async_channel::Sender<Envelope<T>>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Hand `item` to a receiver, waiting until one has accepted it.
    pub(crate) async fn send(&self, item: T) -> Result<(), HandoffClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((item, ack_tx))
            .await
            .map_err(|_| HandoffClosed)?;
        ack_rx.await.map_err(|_| HandoffClosed)
    }

    /// Close the handoff. Receivers still get an item that was already parked.
    pub(crate) fn close(&self) {
        self.tx.close();
    }
}

pub(crate) struct HandoffReceiver<T> {
    rx: async_channel::Receiver<Envelope<T>>,
}

impl<T> Clone for HandoffReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> HandoffReceiver<T> {
    /// Take the next item. `None` once the handoff is closed and empty.
    pub(crate) async fn recv(&self) -> Option<T> {
        let (item, ack) = self.rx.recv().await.ok()?;
        let _ = ack.send(());
        Some(item)
    }

    /// Take an item only if a sender is already waiting.
    pub(crate) fn try_recv(&self) -> Option<T> {
        let (item, ack) = self.rx.try_recv().ok()?;
        let _ = ack.send(());
        Some(item)
    }

    /// `true` once the handoff is closed and no item is parked.
    pub(crate) fn is_terminated(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_send_waits_for_receiver() {
        let (tx, rx) = handoff::<u32>();

        let sender = tokio::spawn(async move { tx.send(1).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!sender.is_finished(), "send must not complete before a receive");

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(sender.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_close_ends_receivers() {
        let (tx, rx) = handoff::<u32>();
        tx.close();

        assert_eq!(rx.recv().await, None);
        assert!(rx.is_terminated());
        assert_eq!(tx.send(5).await, Err(HandoffClosed));
    }

    #[tokio::test]
    async fn test_parked_item_survives_close() {
        let (tx, rx) = handoff::<&str>();
        let sender = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send("last").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        assert_eq!(rx.recv().await, Some("last"));
        assert_eq!(sender.await.unwrap(), Ok(()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_idle_receivers_share_work() {
        let (tx, rx) = handoff::<u32>();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let rx = rx.clone();
            receivers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = rx.recv().await {
                    seen.push(item);
                }
                seen
            }));
        }

        for i in 0..30 {
            tx.send(i).await.unwrap();
        }
        tx.close();

        let mut all = Vec::new();
        for receiver in receivers {
            all.extend(timeout(Duration::from_secs(5), receiver).await.unwrap().unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_try_recv() {
        let (tx, rx) = handoff::<u32>();
        assert_eq!(rx.try_recv(), None);

        let sender = tokio::spawn(async move { tx.send(9).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rx.try_recv(), Some(9));
        assert_eq!(sender.await.unwrap(), Ok(()));
    }
}
