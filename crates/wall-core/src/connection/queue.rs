//! Outbound queue for frames submitted while no transport is open.

use std::collections::VecDeque;

/// FIFO of already-stamped frames waiting for a live transport.
///
/// Frames are stored as encoded text so that the id they were stamped with at
/// submission time is the id they are transmitted with.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame to the back of the queue.
    pub fn push(&mut self, frame: String) {
        self.frames.push_back(frame);
    }

    /// Puts a frame back at the front, ahead of everything queued after it.
    pub fn push_front(&mut self, frame: String) {
        self.frames.push_front(frame);
    }

    /// Removes every frame in submission order and leaves the queue empty.
    pub fn take_all(&mut self) -> Vec<String> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_all_preserves_order_and_clears() {
        // Arrange
        let mut queue = OutboundQueue::new();
        queue.push("a".into());
        queue.push("b".into());
        queue.push("c".into());

        // Act
        let flushed = queue.take_all();

        // Assert
        assert_eq!(flushed, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        assert!(queue.take_all().is_empty());
    }

    #[test]
    fn test_push_front_goes_first() {
        let mut queue = OutboundQueue::new();
        queue.push("second".into());
        queue.push_front("first".into());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_all(), vec!["first", "second"]);
    }
}
