use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::writer::SectionKey;

/// Tells the data-fetching layer that cached reads of a section are stale
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, key: &SectionKey);
}

/// For sessions without a read cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _key: &SectionKey) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invalidation {
    pub key: SectionKey,
    pub at: DateTime<Utc>,
}

/// Broadcasts an [`Invalidation`] after every successful flush.
///
/// Readers subscribe and drop their cached copy of the section.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<Invalidation>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.tx.subscribe()
    }

    /// Number of subscribers that received the event.
    pub fn publish(&self, key: SectionKey) -> usize {
        let event = Invalidation { key, at: Utc::now() };
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(target: "autosave::invalidation", key = %event.key, "no subscribers");
                0
            }
        }
    }
}

#[async_trait]
impl CacheInvalidator for InvalidationBus {
    async fn invalidate(&self, key: &SectionKey) {
        self.publish(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_invalidation() {
        let bus = InvalidationBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.invalidate(&SectionKey::new("r-1", "vehicle")).await;

        assert_eq!(rx1.recv().await.unwrap().key, SectionKey::new("r-1", "vehicle"));
        assert_eq!(rx2.recv().await.unwrap().key.section, "vehicle");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = InvalidationBus::default();
        assert_eq!(bus.publish(SectionKey::new("r-1", "fees")), 0);
    }
}
