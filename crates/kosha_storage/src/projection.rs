//! I define the projection handlers of the storage domain.
//!

use std::sync::Arc;

use async_trait::async_trait;
use kosha_index::StatCache;
use kosha_journal::{dispatch::HandlerError, EventHandler};
use kosha_space::event::{DomainEvent, EventRecord};
use tracing::debug;

/// A projection handler that drops cached container stats
/// touched by committed resource events.
///
/// The service already invalidates synchronously on the
/// mutating path; replaying the invalidation from the log is
/// idempotent, and keeps the cache consistent for events
/// committed by any other writer of the journal.
pub struct StatCacheInvalidator {
    cache: Arc<dyn StatCache>,
}

impl StatCacheInvalidator {
    /// Create a new invalidator over given cache.
    pub fn new(cache: Arc<dyn StatCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventHandler for StatCacheInvalidator {
    fn name(&self) -> &'static str {
        "stat-cache-invalidator"
    }

    fn is_interested_in(&self, event_type: &str) -> bool {
        matches!(
            event_type,
            "resource_created" | "resource_updated" | "resource_deleted"
        )
    }

    async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError> {
        let event = record.decode()?;
        match event {
            DomainEvent::ResourceCreated { id, parent_id, .. }
            | DomainEvent::ResourceDeleted { id, parent_id } => {
                if let Some(parent_id) = parent_id {
                    self.cache.invalidate(parent_id).await;
                }
                self.cache.invalidate(id).await;
            }
            DomainEvent::ResourceUpdated { id, .. } => {
                self.cache.invalidate(id).await;
            }
            _ => {}
        }
        debug!("Replayed stat invalidation for event {}.", record.event_id);
        Ok(())
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kosha_index::{ContainerStats, MokaStatCache};
    use kosha_space::OpaqueId;

    use super::*;

    #[tokio::test]
    async fn resource_events_invalidate_affected_containers() {
        let cache = MokaStatCache::default().into_shared();
        let handler = StatCacheInvalidator::new(cache.clone());

        let parent_id = OpaqueId::generate();
        cache
            .set(
                parent_id,
                ContainerStats {
                    member_count: 2,
                    total_size: 20,
                    cached_at: Utc::now(),
                },
            )
            .await;

        let record = EventRecord::new(&DomainEvent::ResourceCreated {
            id: OpaqueId::generate(),
            parent_id: Some(parent_id),
            content_type: "text/turtle".into(),
            size_bytes: 10,
            etag: "\"e\"".into(),
            is_container: false,
        });
        handler.handle(&record).await.unwrap();

        assert_eq!(cache.get(parent_id).await, None);
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let handler = StatCacheInvalidator::new(MokaStatCache::default().into_shared());
        assert!(!handler.is_interested_in("user_registered"));
    }
}
