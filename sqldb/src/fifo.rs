//! Bounded blocking queue between the node's callbacks and the writer thread.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use crate::config::DEFAULT_QUEUE_SIZE;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed capacity FIFO. `push` blocks while full, `pop` blocks while empty.
pub struct Fifo<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> Fifo<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State { items: VecDeque::with_capacity(capacity), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append an item, waiting for room. A closed queue hands the item back.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting for one to arrive. Returns `None` only
    /// once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Reject further pushes and wake every waiter. Buffered items stay
    /// available to `pop`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_order_across_threads() {
        let fifo = Arc::new(Fifo::new(4));
        let producer = {
            let fifo = fifo.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    fifo.push(i).unwrap();
                }
                fifo.close();
            })
        };

        let mut received = Vec::new();
        while let Some(i) = fifo.pop() {
            received.push(i);
        }
        producer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let fifo = Arc::new(Fifo::new(0));
        assert_eq!(fifo.capacity(), 1);
        fifo.push(1).unwrap();

        let pushed = Arc::new(AtomicUsize::new(0));
        let producer = {
            let fifo = fifo.clone();
            let pushed = pushed.clone();
            thread::spawn(move || {
                fifo.push(2).unwrap();
                pushed.store(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(pushed.load(Ordering::SeqCst), 0);
        assert_eq!(fifo.len(), 1);

        assert_eq!(fifo.pop(), Some(1));
        producer.join().unwrap();
        assert_eq!(pushed.load(Ordering::SeqCst), 1);
        assert_eq!(fifo.pop(), Some(2));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let fifo = Fifo::new(8);
        fifo.push("a").unwrap();
        fifo.push("b").unwrap();
        fifo.close();

        assert!(fifo.is_closed());
        assert_eq!(fifo.push("c"), Err("c"));
        assert_eq!(fifo.pop(), Some("a"));
        assert_eq!(fifo.pop(), Some("b"));
        assert_eq!(fifo.pop(), None);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_close_wakes_blocked_pop() {
        let fifo: Arc<Fifo<u32>> = Arc::new(Fifo::new(2));
        let consumer = {
            let fifo = fifo.clone();
            thread::spawn(move || fifo.pop())
        };

        thread::sleep(Duration::from_millis(50));
        fifo.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_close_wakes_blocked_push() {
        let fifo = Arc::new(Fifo::new(1));
        fifo.push(1u32).unwrap();
        let producer = {
            let fifo = fifo.clone();
            thread::spawn(move || fifo.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        fifo.close();
        assert_eq!(producer.join().unwrap(), Err(2));
        assert_eq!(fifo.pop(), Some(1));
    }
}
