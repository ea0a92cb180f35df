// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO queue with drop-oldest eviction.
//!
//! The queue sits on top of an unbounded lock-free MPMC channel: producers
//! enqueue without taking a lock and the queue keeps both ends so it can
//! evict from the front. Overflow is resolved by removing the oldest entry
//! before enqueuing the newest, never by rejecting the newest.
//!
//! The size check, the eviction and the enqueue are three separate operations.
//! Under heavy concurrent pushes the length can transiently exceed the
//! capacity by up to the number of racing producers.

use crossbeam_channel::{Receiver, Sender};

pub struct DeliveryQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> DeliveryQueue<T> {
    /// Creates an empty queue. A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            capacity: capacity.max(1),
        }
    }

    /// Enqueues `item`, returning the oldest entry if it had to be evicted.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = if self.rx.len() >= self.capacity {
            self.rx.try_recv().ok()
        } else {
            None
        };
        // Both ends are owned by the queue, so the channel is never disconnected
        let _ = self.tx.send(item);
        evicted
    }

    /// Removes and returns the oldest entry.
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Discards every queued entry and returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn drain<T>(queue: &DeliveryQueue<T>) -> Vec<T> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_keeps_last_entries_in_order_on_overflow() {
        let queue = DeliveryQueue::new(5);
        let evicted: Vec<u32> = (1..=10).filter_map(|i| queue.push(i)).collect();

        assert_eq!(evicted, vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.len(), 5);
        assert_eq!(drain(&queue), vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_last_k_for_various_sizes() {
        for (capacity, n) in [(1usize, 3u32), (3, 3), (4, 17), (100, 1_000)] {
            let queue = DeliveryQueue::new(capacity);
            for i in 0..n {
                queue.push(i);
            }
            let expected: Vec<u32> = (n.saturating_sub(capacity as u32)..n).collect();
            assert_eq!(drain(&queue), expected, "capacity {capacity}, n {n}");
        }
    }

    #[test]
    fn test_clear_discards_everything() {
        let queue = DeliveryQueue::new(10);
        for i in 0..7 {
            queue.push(i);
        }
        assert_eq!(queue.clear(), 7);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_zero_capacity_behaves_as_one() {
        let queue = DeliveryQueue::new(0);
        queue.push("a");
        assert_eq!(queue.push("b"), Some("a"));
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_concurrent_pushes_overshoot_is_bounded() {
        const CAPACITY: usize = 64;
        const PRODUCERS: usize = 8;
        let queue = Arc::new(DeliveryQueue::new(CAPACITY));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..5_000 {
                        queue.push((p, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Best effort bound: each racing producer may add at most one extra entry
        assert!(queue.len() <= CAPACITY + PRODUCERS);
        assert!(queue.len() >= CAPACITY);

        // Per-producer order survives eviction
        let mut last = vec![None; PRODUCERS];
        for (p, i) in drain(&queue) {
            if let Some(prev) = last[p] {
                assert!(i > prev);
            }
            last[p] = Some(i);
        }
    }
}
