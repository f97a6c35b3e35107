//! Bounded per-user queue of pending broadcast messages.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use sitehub_core::types::id::UserId;

/// Maximum number of pending messages a queue holds before the oldest is
/// evicted.
pub const QUEUE_CAPACITY: usize = 10;

/// One message pending delivery to a session's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    /// The sending user, or `None` for system messages.
    sender: Option<UserId>,
    /// The message text.
    text: String,
    /// When the message was sent.
    sent: DateTime<Utc>,
}

impl BroadcastMessage {
    /// Creates a message stamped with the current time.
    pub fn new(sender: Option<UserId>, text: impl Into<String>) -> Self {
        Self::new_at(sender, text, Utc::now())
    }

    /// Creates a message with an explicit send timestamp.
    pub fn new_at(sender: Option<UserId>, text: impl Into<String>, sent: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: text.into(),
            sent,
        }
    }

    /// The sending user, if any.
    pub fn sender(&self) -> Option<UserId> {
        self.sender
    }

    /// The message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the message was sent.
    pub fn sent(&self) -> DateTime<Utc> {
        self.sent
    }
}

/// Bounded FIFO of pending broadcast messages, owned by one session.
///
/// Multiple senders push concurrently (request threads, event listeners);
/// the owning user's thread pops. A push onto a full queue evicts the
/// oldest message first — it never blocks and never fails.
#[derive(Debug, Default)]
pub struct BroadcastQueue {
    inner: Mutex<VecDeque<BroadcastMessage>>,
}

impl BroadcastQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message, evicting the oldest when at capacity.
    pub fn push(&self, message: BroadcastMessage) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= QUEUE_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(message);
    }

    /// Removes and returns the oldest pending message.
    pub fn pop(&self) -> Option<BroadcastMessage> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Number of pending messages.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any message is pending.
    pub fn has_pending(&self) -> bool {
        !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(index: usize) -> BroadcastMessage {
        BroadcastMessage::new(None, format!("M{index}"))
    }

    #[test]
    fn test_fifo_order() {
        let queue = BroadcastQueue::new();
        queue.push(message(1));
        queue.push(message(2));

        assert!(queue.has_pending());
        assert_eq!(queue.pop().unwrap().text(), "M1");
        assert_eq!(queue.pop().unwrap().text(), "M2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let queue = BroadcastQueue::new();
        for i in 0..15 {
            queue.push(message(i));
        }

        assert_eq!(queue.len(), QUEUE_CAPACITY);
        for expected in 5..15 {
            assert_eq!(queue.pop().unwrap().text(), format!("M{expected}"));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_twelve_pushes_pop_as_three_through_twelve() {
        let queue = BroadcastQueue::new();
        for i in 1..=12 {
            queue.push(message(i));
        }

        assert_eq!(queue.len(), 10);
        let texts: Vec<String> = std::iter::from_fn(|| queue.pop())
            .map(|m| m.text().to_string())
            .collect();
        let expected: Vec<String> = (3..=12).map(|i| format!("M{i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_concurrent_pushes_never_exceed_capacity() {
        use std::sync::Arc;

        let queue = Arc::new(BroadcastQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(BroadcastMessage::new(None, format!("T{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), QUEUE_CAPACITY);
    }
}
