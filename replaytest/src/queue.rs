//! The bounded transaction queue.
//!
//! A fixed-capacity single-producer/multi-consumer ring buffer. Operations
//! never block: `try_push` and `try_pop` fail immediately on a full or
//! empty queue, and the waiting is orchestrated by the dispatcher and the
//! workers through the two [`Notify`] signals owned here. The index pair
//! is guarded by a single mutex held only for O(1) bookkeeping.

use std::sync::Mutex;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::workload::Transaction;

/// Shared dispatch queue between the dispatcher and the worker pool.
#[derive(Debug)]
pub struct TxQueue {
    ring: Mutex<Ring>,
    /// Signaled when a transaction is enqueued. Predicate: "queue
    /// non-empty (or shutdown requested)".
    non_empty: Notify,
    /// Signaled when a slot is freed. Predicate: "queue non-full".
    non_full: Notify,
}

#[derive(Debug)]
struct Ring {
    slots: Box<[Option<Transaction>]>,
    read: usize,
    write: usize,
}

impl Ring {
    /// `read == write` means empty; one slot stays unused so that a full
    /// queue (`write + 1 == read`, mod slots) is distinguishable from it.
    fn is_empty(&self) -> bool {
        self.read == self.write
    }

    fn is_full(&self) -> bool {
        (self.write + 1) % self.slots.len() == self.read
    }

    fn len(&self) -> usize {
        (self.write + self.slots.len() - self.read) % self.slots.len()
    }
}

impl TxQueue {
    /// Creates a queue holding up to `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity + 1).map(|_| None).collect(),
                read: 0,
                write: 0,
            }),
            non_empty: Notify::new(),
            non_full: Notify::new(),
        }
    }

    /// Enqueues a transaction, handing back ownership if the queue is full.
    ///
    /// On success, wakes one consumer blocked on the non-empty signal.
    pub fn try_push(&self, transaction: Transaction) -> Result<(), Transaction> {
        let mut ring = self.ring.lock().unwrap();
        if ring.is_full() {
            return Err(transaction);
        }
        let write = ring.write;
        ring.slots[write] = Some(transaction);
        ring.write = (write + 1) % ring.slots.len();
        drop(ring);

        self.non_empty.notify_one();
        Ok(())
    }

    /// Dequeues the oldest transaction, or `None` if the queue is empty.
    ///
    /// On success, wakes a producer blocked on the non-full signal.
    pub fn try_pop(&self) -> Option<Transaction> {
        let mut ring = self.ring.lock().unwrap();
        if ring.is_empty() {
            return None;
        }
        let read = ring.read;
        let transaction = ring.slots[read].take()?;
        ring.read = (read + 1) % ring.slots.len();
        drop(ring);

        self.non_full.notify_one();
        Some(transaction)
    }

    /// Returns whether the queue holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.ring.lock().unwrap().is_empty()
    }

    /// Returns whether the queue cannot accept another transaction.
    pub fn is_full(&self) -> bool {
        self.ring.lock().unwrap().is_full()
    }

    /// Returns the current number of queued transactions.
    pub fn len(&self) -> usize {
        self.ring.lock().unwrap().len()
    }

    /// Returns the (read, write) indices for diagnostic snapshots.
    pub fn indices(&self) -> (usize, usize) {
        let ring = self.ring.lock().unwrap();
        (ring.read, ring.write)
    }

    /// A wakeup that fires once the queue may be non-empty.
    ///
    /// Create the future *before* re-checking [`try_pop`] so a concurrent
    /// push or shutdown wakeup cannot be lost between check and wait.
    pub fn non_empty_signal(&self) -> Notified<'_> {
        self.non_empty.notified()
    }

    /// A wakeup that fires once a slot may have been freed.
    pub fn non_full_signal(&self) -> Notified<'_> {
        self.non_full.notified()
    }

    /// Wakes every consumer waiting on the non-empty signal.
    ///
    /// Used at shutdown so idle workers re-check the shutdown flag.
    pub fn wake_consumers(&self) {
        self.non_empty.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: usize) -> Transaction {
        Transaction {
            id,
            arrival_ms: 0,
            service_delay_ms: 0,
            subject: "s".into(),
            object: "o".into(),
            predicates: Vec::new(),
        }
    }

    #[test]
    fn capacity_four_accepts_four() {
        let queue = TxQueue::new(4);

        for id in 0..3 {
            queue.try_push(tx(id)).unwrap();
        }
        assert!(!queue.is_full());
        assert!(!queue.is_empty());

        queue.try_push(tx(3)).unwrap();
        assert!(queue.is_full());

        let rejected = queue.try_push(tx(4)).unwrap_err();
        assert_eq!(rejected.id, 4);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let queue = TxQueue::new(4);
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn fifo_order() {
        let queue = TxQueue::new(8);
        for id in 0..5 {
            queue.try_push(tx(id)).unwrap();
        }
        for id in 0..5 {
            assert_eq!(queue.try_pop().unwrap().id, id);
        }
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn indices_wrap_around() {
        let queue = TxQueue::new(2);

        for round in 0..10 {
            queue.try_push(tx(round * 2)).unwrap();
            queue.try_push(tx(round * 2 + 1)).unwrap();
            assert!(queue.is_full());

            assert_eq!(queue.try_pop().unwrap().id, round * 2);
            assert_eq!(queue.try_pop().unwrap().id, round * 2 + 1);
            assert!(queue.is_empty());
        }
    }

    #[tokio::test]
    async fn push_wakes_a_waiting_consumer() {
        let queue = std::sync::Arc::new(TxQueue::new(4));

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move {
                loop {
                    let signal = queue.non_empty_signal();
                    if let Some(transaction) = queue.try_pop() {
                        return transaction.id;
                    }
                    signal.await;
                }
            })
        };

        tokio::task::yield_now().await;
        queue.try_push(tx(9)).unwrap();
        assert_eq!(waiter.await.unwrap(), 9);
    }
}
