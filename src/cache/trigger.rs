//! Cache trigger service.
//!
//! Publishes cache events from write paths and optionally consumes them
//! immediately.

use std::sync::Arc;

use tracing::debug;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};

/// Wraps the event queue and consumer for write operations.
///
/// ```ignore
/// // After a successful product write:
/// trigger.product_created(product.id).await;
/// ```
pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// Without `consume_now` the event waits for the background consumer or
    /// the next explicit consumption.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume_all().await;
        }
    }

    /// Invalidate every listing page after a product write.
    ///
    /// Consumed before returning, including events queued ahead of it and any
    /// batch the background consumer is still applying, so a read issued after
    /// the write completes never observes a fresh pre-write page.
    pub async fn product_created(&self, product_id: u32) {
        self.trigger(EventKind::ProductCreated { product_id }, true)
            .await;
    }

    pub async fn warmup_on_startup(&self) {
        self.trigger(EventKind::WarmupOnStartup, true).await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer> {
        &self.consumer
    }
}
