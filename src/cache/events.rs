//! Cache events published by writes and drained by the consumer.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
const METRIC_QUEUE_LEN: &str = "vitrine_cache_event_queue_len";

/// Monotonic ordering number assigned at publish time.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier used to drop duplicates.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A product was written; every listing page may now be out of date.
    ProductCreated { product_id: u32 },
    /// Prime the default listing page after startup.
    WarmupOnStartup,
}

/// In-memory FIFO of pending cache events.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn epoch_monotonicity() {
        let queue = EventQueue::new();
        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        assert!(e1 < e2);
    }

    #[test]
    fn publish_and_drain_in_fifo_order() {
        let queue = EventQueue::new();
        queue.publish(EventKind::ProductCreated { product_id: 1 });
        queue.publish(EventKind::WarmupOnStartup);
        queue.publish(EventKind::ProductCreated { product_id: 2 });

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(events[0].kind, EventKind::ProductCreated { product_id: 1 });
        assert_eq!(events[1].kind, EventKind::WarmupOnStartup);
        assert!(events[0].epoch < events[1].epoch);
    }

    #[test]
    fn drain_more_than_available() {
        let queue = EventQueue::new();
        queue.publish(EventKind::WarmupOnStartup);

        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(EventKind::WarmupOnStartup);
        assert_eq!(queue.len(), 1);
    }
}
