//! Activation-gated FIFO connecting one producer thread to one consumer thread.
//!
//! The queue doubles as the shutdown signal of a listening session: producers
//! keep going while [`HandoffQueue::is_active`] holds, and deactivating the
//! queue both stops accepting new items and hides the buffered ones.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct HandoffQueue<T> {
    active: AtomicBool,
    /// Mirror of `items.len()`, written under the lock and read without it.
    len: AtomicUsize,
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandoffQueue<T> {
    /// Create an empty, inactive queue.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            len: AtomicUsize::new(0),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Stop accepting and returning items. Buffered items are kept but become
    /// unreachable until [`HandoffQueue::empty`] clears them.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Append `item` at the tail, or drop it if the queue is inactive.
    pub fn put(&self, item: T) {
        let mut items = self.lock();
        if self.is_active() {
            items.push_back(item);
            self.len.store(items.len(), Ordering::Release);
        }
    }

    /// Remove and return the head item. Never blocks on contents.
    pub fn get(&self) -> Option<T> {
        if !self.is_not_empty() {
            return None;
        }
        let mut items = self.lock();
        if !self.is_active() {
            return None;
        }
        let item = items.pop_front();
        self.len.store(items.len(), Ordering::Release);
        item
    }

    /// Drop all buffered items without touching the active flag.
    pub fn empty(&self) {
        let mut items = self.lock();
        items.clear();
        self.len.store(0, Ordering::Release);
    }

    /// Racy hint used to skip lock acquisition before [`HandoffQueue::get`].
    /// Never takes the lock.
    pub fn is_not_empty(&self) -> bool {
        self.len() != 0
    }

    /// Buffered items, hidden ones included. A snapshot; never takes the lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        !self.is_not_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking peer cannot leave a VecDeque half-updated, so poisoning is ignored.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn new_queue_is_inactive_and_discards_puts() {
        let queue = HandoffQueue::new();
        assert!(!queue.is_active());
        queue.put(1u8);
        assert!(queue.is_empty());
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.put('x');
        assert!(queue.is_not_empty());
        assert_eq!(queue.get(), Some('x'));
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn items_come_out_in_insertion_order() {
        let queue = HandoffQueue::new();
        queue.activate();
        for i in 0..10 {
            queue.put(i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| queue.get()).collect();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn deactivate_hides_buffered_items_without_erasing_them() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.put(1);
        queue.put(2);
        queue.deactivate();

        queue.put(3);
        assert_eq!(queue.get(), None);
        assert_eq!(queue.get(), None);
        assert_eq!(queue.len(), 2);

        queue.activate();
        assert_eq!(queue.get(), Some(1));
        assert_eq!(queue.get(), Some(2));
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn empty_then_activate_leaves_queue_logically_empty() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.put("a");
        queue.deactivate();
        queue.empty();
        assert!(!queue.is_active());
        queue.activate();
        assert_eq!(queue.get(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn activation_toggles_are_idempotent() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.activate();
        assert!(queue.is_active());
        queue.put(7);
        queue.deactivate();
        queue.deactivate();
        assert!(!queue.is_active());
        queue.activate();
        assert_eq!(queue.get(), Some(7));
    }

    #[test]
    fn emptiness_hint_does_not_wait_for_the_lock() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.put(5u8);

        let held = queue.items.lock().unwrap();
        assert!(queue.is_not_empty());
        assert_eq!(queue.len(), 1);
        drop(held);

        assert_eq!(queue.get(), Some(5));
        assert!(!queue.is_not_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn empty_resets_the_length() {
        let queue = HandoffQueue::new();
        queue.activate();
        queue.put(1);
        queue.put(2);
        queue.empty();
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn single_producer_single_consumer_preserves_order() {
        let queue = Arc::new(HandoffQueue::new());
        queue.activate();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    queue.put(i);
                }
            })
        };

        let mut received = Vec::with_capacity(1000);
        while received.len() < 1000 {
            match queue.get() {
                Some(item) => received.push(item),
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }
}
