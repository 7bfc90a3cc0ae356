//! Growable FIFO ring buffer
//!
//! The single channel between the capture stage (producer) and the encode
//! stage (consumer). Pushing never blocks and never drops: a full ring is
//! reallocated to `2 * capacity + 1` slots with the pending items copied
//! starting at the head, so order survives any wraparound.

use std::sync::{Mutex, MutexGuard};

/// Initial capacity used by the recording pipeline
pub const DEFAULT_CAPACITY: usize = 128;

/// Thread-safe growable ring queue
pub struct RingQueue<T> {
    ring: Mutex<Ring<T>>,
    /// Pending-item count above which growth is reported as a warning
    soft_limit: usize,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    /// Index of the next item to pop
    head: usize,
    /// Index of the next free slot to push into
    tail: usize,
    /// Tracked separately because `head == tail` is both empty and full
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: empty_slots(capacity),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, item: T) {
        if self.len == self.capacity() {
            self.grow();
        }
        assert!(
            self.len < self.capacity(),
            "ring queue failed to grow: len={} capacity={}",
            self.len,
            self.capacity()
        );

        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let mut slots = empty_slots(old_capacity * 2 + 1);
        for (offset, slot) in slots.iter_mut().take(self.len).enumerate() {
            *slot = self.slots[(self.head + offset) % old_capacity].take();
        }

        self.slots = slots;
        self.head = 0;
        self.tail = self.len;
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

fn empty_slots<T>(capacity: usize) -> Vec<Option<T>> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

impl<T> RingQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            soft_limit: usize::MAX,
        }
    }

    /// Warn in the log whenever the queue grows past `limit` pending items
    pub fn with_soft_limit(mut self, limit: usize) -> Self {
        self.soft_limit = limit;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an item, growing the ring if it is full
    pub fn push(&self, item: T) {
        let mut ring = self.lock();
        let before = ring.capacity();
        ring.push(item);

        let after = ring.capacity();
        if after != before {
            if ring.len > self.soft_limit {
                log::warn!(
                    "Frame queue grew to {} slots with {} pending items; the encoder is falling behind",
                    after,
                    ring.len
                );
            } else {
                log::debug!("Frame queue grew from {} to {} slots", before, after);
            }
        }
    }

    /// Remove the oldest item, or `None` when the queue is empty
    pub fn pop(&self) -> Option<T> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Drop every pending item, keeping the allocated capacity
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<T> Default for RingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_pop_empty() {
        let queue: RingQueue<i32> = RingQueue::with_capacity(10);
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = RingQueue::with_capacity(10);
        queue.push(123);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(123));

        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert!(queue.is_empty());

        for i in 0..15 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 15);
        for i in 0..15 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_sizes() {
        let queue = RingQueue::with_capacity(3);
        queue.push(1);
        assert_eq!(queue.len(), 1);
        queue.push(2);
        assert_eq!(queue.len(), 2);
        queue.push(3);
        assert_eq!(queue.len(), 3);

        let queue = RingQueue::with_capacity(3);
        queue.push(1);
        queue.pop();
        assert_eq!(queue.len(), 0);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_full_ring_is_not_empty() {
        // head == tail on a full ring must still report every item
        let queue = RingQueue::with_capacity(4);
        queue.pop();
        for i in 0..4 {
            queue.push(i);
        }
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.len(), 4);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_growth_preserves_order_after_wraparound() {
        for shift in 0..5 {
            let queue = RingQueue::with_capacity(5);
            // Move head/tail into the middle of the ring first
            for i in 0..shift {
                queue.push(-(i as i64) - 1);
            }
            for _ in 0..shift {
                queue.pop();
            }

            for i in 0..23 {
                queue.push(i);
            }
            assert!(queue.capacity() >= 23);
            let drained: Vec<i64> = std::iter::from_fn(|| queue.pop()).collect();
            assert_eq!(drained, (0..23).collect::<Vec<_>>(), "shift={shift}");
        }
    }

    #[test]
    fn test_growth_from_zero_capacity() {
        let queue = RingQueue::with_capacity(0);
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_size_matches_model_for_mixed_operations() {
        let queue = RingQueue::with_capacity(2);
        let mut model = VecDeque::new();
        // Deterministic xorshift so the interleaving is reproducible
        let mut state: u32 = 0x9e37_79b9;
        for step in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if state % 3 == 0 {
                assert_eq!(queue.pop(), model.pop_front(), "step={step}");
            } else {
                queue.push(step);
                model.push_back(step);
            }
            assert_eq!(queue.len(), model.len());
            assert_eq!(queue.is_empty(), model.is_empty());
        }
        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, model.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_clear_resets_for_reuse() {
        let queue = RingQueue::with_capacity(2);
        for i in 0..7 {
            queue.push(i);
        }
        let capacity = queue.capacity();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), capacity);
        queue.push(42);
        assert_eq!(queue.pop(), Some(42));
    }

    #[test]
    fn test_shared_between_threads() {
        let queue = std::sync::Arc::new(RingQueue::with_capacity(1));
        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    queue.push(i);
                }
            })
        };
        producer.join().unwrap();
        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, (0..500).collect::<Vec<_>>());
    }
}
