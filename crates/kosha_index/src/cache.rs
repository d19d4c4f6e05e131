//! I define the bounded container-stat cache.
//!

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kosha_space::OpaqueId;
use moka::future::{Cache, CacheBuilder};

/// Cached aggregate stats of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    /// Number of direct members.
    pub member_count: u64,

    /// Sum of direct member sizes.
    pub total_size: u64,

    /// Instant at which the stats were computed.
    pub cached_at: DateTime<Utc>,
}

/// A narrow keyed-cache interface over container stats, so
/// alternative backends can be substituted.
///
/// There is no negative caching: a miss stays a miss until a
/// fresh value is set. Every membership mutation must
/// invalidate the affected parent's entry synchronously,
/// before the mutating call returns.
#[async_trait]
pub trait StatCache: Send + Sync + 'static {
    /// Get the cached stats of given container, if fresh.
    async fn get(&self, container_id: OpaqueId) -> Option<ContainerStats>;

    /// Cache given stats for given container.
    async fn set(&self, container_id: OpaqueId, stats: ContainerStats);

    /// Drop the entry of given container.
    async fn invalidate(&self, container_id: OpaqueId);
}

/// Default ttl of cached stats.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default entry capacity.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// A [`StatCache`] over a moka future cache: bounded by entry
/// count with lru-flavored eviction, and a ttl on every entry.
#[derive(Debug, Clone)]
pub struct MokaStatCache {
    cache: Cache<OpaqueId, ContainerStats>,
}

impl Default for MokaStatCache {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl MokaStatCache {
    /// Create a new cache with given entry capacity and ttl.
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        Self {
            cache: CacheBuilder::new(max_capacity)
                .time_to_live(time_to_live)
                .build(),
        }
    }

    /// Wrap into a shareable trait object.
    pub fn into_shared(self) -> Arc<dyn StatCache> {
        Arc::new(self)
    }
}

#[async_trait]
impl StatCache for MokaStatCache {
    async fn get(&self, container_id: OpaqueId) -> Option<ContainerStats> {
        self.cache.get(&container_id).await
    }

    async fn set(&self, container_id: OpaqueId, stats: ContainerStats) {
        self.cache.insert(container_id, stats).await;
    }

    async fn invalidate(&self, container_id: OpaqueId) {
        self.cache.invalidate(&container_id).await;
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
