//! Guide materialization engine
//!
//! Data flows one way: lineups from the external source are snapshotted into
//! a [`BuildContext`], resolved against the wall clock by the resolver,
//! shaped into windows by the builder, and published into the cache that
//! serves range queries and the XMLTV export.

pub mod accumulation;
pub mod cache;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod window;

pub use accumulation::AccumulationTable;
pub use cache::GuideCache;
pub use resolver::Resolver;
pub use scheduler::{BuildOutcome, ChannelBuildScheduler};
pub use service::GuideService;
pub use window::GuideWindowBuilder;

use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::errors::SourceResult;
use crate::models::{Channel, Lineup, LineupItem};
use crate::sources::LineupSource;

/// Slot duration substituted for a channel whose lineup is empty
const EMPTY_LINEUP_SLOT_MS: u64 = 24 * 60 * 60 * 1000;

/// One channel's snapshot inside a build context
pub struct ChannelEntry {
    pub channel: Channel,
    pub lineup: Lineup,
    pub table: AccumulationTable,
}

/// Read-only channel/lineup snapshot for one orchestration pass
///
/// Loaded once per pass and discarded when the pass ends; never shared
/// across passes, so builds always act on fresh lineups and memory stays
/// bounded. Channels with empty lineups get a synthetic 24-hour offline
/// slot so the accumulation table is never built over zero items.
pub struct BuildContext {
    entries: HashMap<Uuid, ChannelEntry>,
}

impl BuildContext {
    pub async fn load(source: &dyn LineupSource) -> SourceResult<Self> {
        let pairs = source.load_all().await?;
        Ok(Self::from_channels(pairs))
    }

    pub fn from_channels(pairs: Vec<(Channel, Lineup)>) -> Self {
        let mut entries = HashMap::with_capacity(pairs.len());
        for (channel, lineup) in pairs {
            let lineup = if lineup.is_empty() {
                debug!(
                    "Channel '{}' ({}) has no programs, substituting a 24h offline slot",
                    channel.name, channel.id
                );
                Lineup::new(vec![LineupItem::Offline {
                    duration_ms: EMPTY_LINEUP_SLOT_MS,
                }])
            } else {
                lineup
            };
            // Build cannot fail here: the lineup is guaranteed non-empty above
            let Ok(table) = AccumulationTable::build(&lineup) else {
                continue;
            };
            entries.insert(
                channel.id,
                ChannelEntry {
                    channel,
                    lineup,
                    table,
                },
            );
        }
        Self { entries }
    }

    pub fn get(&self, channel_id: Uuid) -> Option<&ChannelEntry> {
        self.entries.get(&channel_id)
    }

    /// Channel ids in ascending channel-number order for deterministic passes
    pub fn channel_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<_> = self.entries.values().collect();
        ids.sort_by_key(|entry| entry.channel.number);
        ids.iter().map(|entry| entry.channel.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
