//! FIFO message queue between the receive loop and its consumers
//!
//! A device owns two of these: one for command messages and one for data.
//! The receive task is the only producer; consumers either poll without
//! blocking or await the next message. Closing the queue wakes every waiter.
//! Messages already queued stay readable after close; once drained the queue
//! reports [`IgtlError::Disconnected`].

use crate::error::{IgtlError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Queue capacity and overflow behavior
///
/// Unbounded by default; a capacity is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued messages (None = unbounded)
    pub capacity: Option<usize>,
    /// Drop the oldest message instead of rejecting a new one when full
    pub drop_on_full: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl QueueConfig {
    /// No capacity limit
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            drop_on_full: false,
        }
    }

    /// Reject new messages beyond `capacity`
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            drop_on_full: false,
        }
    }

    /// Keep the newest `capacity` messages
    pub fn bounded_drop_old(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            drop_on_full: true,
        }
    }
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages accepted
    pub enqueued: u64,
    /// Messages handed to consumers
    pub dequeued: u64,
    /// Queued messages evicted to make room (`drop_on_full`)
    pub dropped: u64,
    /// New messages refused because the queue was full
    pub rejected: u64,
    /// Messages currently queued
    pub current_size: usize,
    /// Highest `current_size` seen
    pub peak_size: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
    stats: QueueStats,
}

/// Thread-safe FIFO queue with non-blocking and async consumers
pub struct MessageQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    config: QueueConfig,
}

impl<T> MessageQueue<T> {
    /// Queue with the default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Queue with a custom configuration
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
                stats: QueueStats::default(),
            }),
            notify: Notify::new(),
            config,
        }
    }

    /// Append a message
    ///
    /// # Errors
    ///
    /// - [`IgtlError::Disconnected`] - the queue was closed
    /// - [`IgtlError::QueueFull`] - bounded, full and not configured to drop
    pub fn enqueue(&self, item: T) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(IgtlError::Disconnected);
            }

            if let Some(capacity) = self.config.capacity {
                if inner.items.len() >= capacity {
                    if !self.config.drop_on_full || inner.items.pop_front().is_none() {
                        inner.stats.rejected += 1;
                        return Err(IgtlError::QueueFull { capacity });
                    }
                    inner.stats.dropped += 1;
                }
            }

            inner.items.push_back(item);
            let size = inner.items.len();
            inner.stats.enqueued += 1;
            inner.stats.current_size = size;
            inner.stats.peak_size = inner.stats.peak_size.max(size);
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Take the oldest message without waiting
    ///
    /// `Ok(None)` when the queue is empty but still open.
    pub fn try_dequeue(&self) -> Result<Option<T>> {
        let mut inner = self.inner.lock();
        match inner.items.pop_front() {
            Some(item) => {
                inner.stats.dequeued += 1;
                inner.stats.current_size = inner.items.len();
                Ok(Some(item))
            }
            None if inner.closed => Err(IgtlError::Disconnected),
            None => Ok(None),
        }
    }

    /// Wait for the oldest message
    ///
    /// Returns [`IgtlError::Disconnected`] once the queue is closed and drained.
    pub async fn dequeue(&self) -> Result<T> {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_dequeue()? {
                return Ok(item);
            }
            notified.await;
        }
    }

    /// Stop accepting messages and wake all waiters
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// True after [`MessageQueue::close`]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    /// Queue configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MessageQueue")
            .field("len", &inner.items.len())
            .field("closed", &inner.closed)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::with_config(QueueConfig::unbounded());
        for i in 0..100u32 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 100);
        for i in 0..100u32 {
            assert_eq!(queue.try_dequeue().unwrap(), Some(i));
        }
        assert_eq!(queue.try_dequeue().unwrap(), None);
    }

    #[test]
    fn test_bounded_rejects_when_full() {
        let queue = MessageQueue::with_config(QueueConfig::bounded(2));
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert!(matches!(queue.enqueue(3), Err(IgtlError::QueueFull { capacity: 2 })));
        assert_eq!(queue.stats().rejected, 1);
        assert_eq!(queue.stats().dropped, 0);

        queue.try_dequeue().unwrap();
        assert!(queue.enqueue(3).is_ok());
        assert_eq!(queue.stats().enqueued, 3);
    }

    #[test]
    fn test_default_is_unbounded() {
        let queue = MessageQueue::new();
        assert_eq!(queue.config().capacity, None);
        for i in 0..5_000u32 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 5_000);
        assert_eq!(queue.stats().rejected, 0);
    }

    #[test]
    fn test_bounded_drop_old() {
        let queue = MessageQueue::with_config(QueueConfig::bounded_drop_old(5));
        for i in 0..10 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.try_dequeue().unwrap(), Some(5));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 10);
        assert_eq!(stats.dropped, 5);
        assert_eq!(stats.peak_size, 5);
    }

    #[test]
    fn test_zero_capacity_never_accepts() {
        let queue = MessageQueue::with_config(QueueConfig::bounded_drop_old(0));
        assert!(matches!(queue.enqueue(1), Err(IgtlError::QueueFull { capacity: 0 })));
    }

    #[test]
    fn test_close_drains_then_disconnects() {
        let queue = MessageQueue::new();
        queue.enqueue("a").unwrap();
        queue.close();

        assert!(matches!(queue.enqueue("b"), Err(IgtlError::Disconnected)));
        assert_eq!(queue.try_dequeue().unwrap(), Some("a"));
        assert!(matches!(queue.try_dequeue(), Err(IgtlError::Disconnected)));
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_message() {
        let queue = Arc::new(MessageQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queue.enqueue(7u8).unwrap();
            })
        };

        let value = tokio::time::timeout(Duration::from_secs(2), queue.dequeue())
            .await
            .expect("dequeue timed out")
            .unwrap();
        assert_eq!(value, 7);
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_wakes_waiter() {
        let queue = Arc::new(MessageQueue::<u8>::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
        assert!(matches!(result, Err(IgtlError::Disconnected)));
    }

    #[tokio::test]
    async fn test_concurrent_producer_consumer() {
        let queue = Arc::new(MessageQueue::with_config(QueueConfig::unbounded()));

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for i in 0..500u32 {
                    queue.enqueue(i).unwrap();
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let mut received = Vec::with_capacity(500);
        while received.len() < 500 {
            received.push(queue.dequeue().await.unwrap());
        }
        producer.await.unwrap();

        assert_eq!(received, (0..500).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}
