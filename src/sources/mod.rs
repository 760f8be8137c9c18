//! Boundary contracts for lineup and program data
//!
//! The engine never owns persistence. Lineups arrive through `LineupSource`
//! and playable-unit metadata through `ProgramMaterializer`; both ship with
//! in-memory implementations for embedders without a persistence layer and
//! for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{SourceError, SourceResult};
use crate::models::{Channel, Lineup, PublicProgramView};

/// Supplies the authoritative current lineup for every channel
#[async_trait]
pub trait LineupSource: Send + Sync {
    /// Load every channel with its lineup; called once per orchestration pass
    async fn load_all(&self) -> SourceResult<Vec<(Channel, Lineup)>>;

    /// Load a single channel with its lineup
    async fn load(&self, channel_id: Uuid) -> SourceResult<(Channel, Lineup)>;
}

/// Resolves opaque content references into externally-facing program views
///
/// Only used when producing published guide payloads (query views, XMLTV),
/// never during the resolution algorithm itself.
#[async_trait]
pub trait ProgramMaterializer: Send + Sync {
    async fn resolve_content_refs(
        &self,
        ids: &[String],
    ) -> anyhow::Result<HashMap<String, PublicProgramView>>;
}

/// Simple in-memory lineup source
#[derive(Default)]
pub struct InMemoryLineupSource {
    channels: RwLock<HashMap<Uuid, (Channel, Lineup)>>,
}

impl InMemoryLineupSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, channel: Channel, lineup: Lineup) {
        self.channels
            .write()
            .await
            .insert(channel.id, (channel, lineup));
    }

    pub async fn remove(&self, channel_id: Uuid) {
        self.channels.write().await.remove(&channel_id);
    }
}

#[async_trait]
impl LineupSource for InMemoryLineupSource {
    async fn load_all(&self) -> SourceResult<Vec<(Channel, Lineup)>> {
        Ok(self.channels.read().await.values().cloned().collect())
    }

    async fn load(&self, channel_id: Uuid) -> SourceResult<(Channel, Lineup)> {
        self.channels
            .read()
            .await
            .get(&channel_id)
            .cloned()
            .ok_or(SourceError::NotFound { channel_id })
    }
}

/// In-memory program catalog keyed by content reference
#[derive(Default)]
pub struct StaticProgramCatalog {
    programs: RwLock<HashMap<String, PublicProgramView>>,
}

impl StaticProgramCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, view: PublicProgramView) {
        self.programs.write().await.insert(view.id.clone(), view);
    }
}

#[async_trait]
impl ProgramMaterializer for StaticProgramCatalog {
    async fn resolve_content_refs(
        &self,
        ids: &[String],
    ) -> anyhow::Result<HashMap<String, PublicProgramView>> {
        let programs = self.programs.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| programs.get(id).map(|view| (id.clone(), view.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::LineupItem;

    fn channel(name: &str) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            number: 1,
            start_time: Utc::now(),
            guide_minimum_duration_ms: 0,
            stealth: false,
        }
    }

    #[tokio::test]
    async fn in_memory_source_round_trips() {
        let source = InMemoryLineupSource::new();
        let ch = channel("test");
        let id = ch.id;
        source
            .insert(
                ch,
                Lineup::new(vec![LineupItem::Offline { duration_ms: 1000 }]),
            )
            .await;

        let (loaded, lineup) = source.load(id).await.unwrap();
        assert_eq!(loaded.name, "test");
        assert_eq!(lineup.len(), 1);
        assert_eq!(source.load_all().await.unwrap().len(), 1);

        source.remove(id).await;
        assert!(matches!(
            source.load(id).await,
            Err(SourceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn catalog_resolves_known_refs_only() {
        let catalog = StaticProgramCatalog::new();
        catalog
            .insert(PublicProgramView {
                id: "p1".into(),
                title: "A Show".into(),
                description: None,
            })
            .await;

        let views = catalog
            .resolve_content_refs(&["p1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views["p1"].title, "A Show");
    }
}
