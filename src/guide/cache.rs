//! Queryable cache of materialized guides
//!
//! Holds the latest complete guide per channel as an `Arc` snapshot.
//! Publishing replaces the snapshot wholesale, so a reader mid-query keeps
//! the previous complete guide and never observes a partial write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::errors::{GuideError, GuideResult};
use crate::models::{MaterializedGuide, ResolvedProgram};
use crate::utils::time::ms_between;

#[derive(Default)]
pub struct GuideCache {
    guides: RwLock<HashMap<Uuid, Arc<MaterializedGuide>>>,
}

impl GuideCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the cached guide for a channel
    pub async fn put(&self, guide: MaterializedGuide) {
        self.guides
            .write()
            .await
            .insert(guide.channel_id, Arc::new(guide));
    }

    /// Latest complete guide, unclipped
    pub async fn get(&self, channel_id: Uuid) -> Option<Arc<MaterializedGuide>> {
        self.guides.read().await.get(&channel_id).cloned()
    }

    /// Channels with a published guide
    pub async fn channel_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<_> = self.guides.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Entries overlapping `[from, to)`, boundary entries clipped to the window
    ///
    /// A channel that was never built, or a request past the cached horizon,
    /// answers "not available"; the latter is a staleness condition worth a
    /// warning but not an error.
    pub async fn query_range(
        &self,
        channel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GuideResult<Vec<ResolvedProgram>> {
        let guide = self
            .get(channel_id)
            .await
            .ok_or(GuideError::NotAvailable { channel_id })?;
        if to > guide.built_to {
            warn!(
                "Guide for channel {} is stale: cached through {}, requested {}",
                channel_id, guide.built_to, to
            );
            return Err(GuideError::Stale {
                channel_id,
                built_to: guide.built_to,
                requested_to: to,
            });
        }

        let mut out = Vec::new();
        for item in &guide.items {
            if item.end() <= from || item.start >= to {
                continue;
            }
            let start = item.start.max(from);
            let end = item.end().min(to);
            out.push(ResolvedProgram {
                lineup_index: item.lineup_index,
                start,
                item: item.item.with_duration(ms_between(start, end)),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineupItem;
    use chrono::TimeZone;

    fn epoch(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn guide_with(channel_id: Uuid, spans: &[(i64, u64)]) -> MaterializedGuide {
        let items = spans
            .iter()
            .map(|&(start, duration_ms)| ResolvedProgram {
                lineup_index: None,
                start: epoch(start),
                item: LineupItem::Offline { duration_ms },
            })
            .collect::<Vec<_>>();
        let built_from = items.first().map(|p| p.start).unwrap_or(epoch(0));
        let built_to = items.last().map(|p| p.end()).unwrap_or(epoch(0));
        MaterializedGuide {
            channel_id,
            items,
            built_from,
            built_to,
        }
    }

    #[tokio::test]
    async fn replaces_guides_atomically() {
        let cache = GuideCache::new();
        let id = Uuid::new_v4();
        cache.put(guide_with(id, &[(0, 1000)])).await;
        cache.put(guide_with(id, &[(0, 5000)])).await;

        let guide = cache.get(id).await.unwrap();
        assert_eq!(guide.items.len(), 1);
        assert_eq!(guide.items[0].item.duration_ms(), 5000);
    }

    #[tokio::test]
    async fn clips_boundary_entries_to_the_window() {
        let cache = GuideCache::new();
        let id = Uuid::new_v4();
        cache
            .put(guide_with(id, &[(0, 4000), (4000, 4000), (8000, 4000)]))
            .await;

        let items = cache.query_range(id, epoch(2000), epoch(9000)).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].start, epoch(2000));
        assert_eq!(items[0].item.duration_ms(), 2000);
        assert_eq!(items[1].item.duration_ms(), 4000);
        assert_eq!(items[2].start, epoch(8000));
        assert_eq!(items[2].end(), epoch(9000));
    }

    #[tokio::test]
    async fn unknown_channel_is_not_available() {
        let cache = GuideCache::new();
        assert!(matches!(
            cache.query_range(Uuid::new_v4(), epoch(0), epoch(1)).await,
            Err(GuideError::NotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn requests_past_the_horizon_are_stale() {
        let cache = GuideCache::new();
        let id = Uuid::new_v4();
        cache.put(guide_with(id, &[(0, 4000)])).await;

        assert!(matches!(
            cache.query_range(id, epoch(0), epoch(10_000)).await,
            Err(GuideError::Stale { .. })
        ));
    }
}
