//! Core data model for channels, lineups and materialized guides

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single slot in a channel's cyclic lineup
///
/// The lineup is a closed set of slot kinds: playable content, a redirect
/// into another channel's current program, or offline/flex filler. Every
/// variant carries its slot duration in milliseconds; a duration of zero is
/// invalid and is treated as a fatal condition for the resolution step that
/// encounters it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineupItem {
    /// Playable unit, resolved externally through a program reference
    Content { program_id: String, duration_ms: u64 },
    /// Defers to another channel's current program for the slot duration
    Redirect { channel_id: Uuid, duration_ms: u64 },
    /// Flex/filler padding with no assigned content
    Offline { duration_ms: u64 },
}

impl LineupItem {
    pub fn duration_ms(&self) -> u64 {
        match self {
            LineupItem::Content { duration_ms, .. }
            | LineupItem::Redirect { duration_ms, .. }
            | LineupItem::Offline { duration_ms } => *duration_ms,
        }
    }

    /// Same slot identity with a different duration
    pub fn with_duration(&self, duration_ms: u64) -> LineupItem {
        match self {
            LineupItem::Content { program_id, .. } => LineupItem::Content {
                program_id: program_id.clone(),
                duration_ms,
            },
            LineupItem::Redirect { channel_id, .. } => LineupItem::Redirect {
                channel_id: *channel_id,
                duration_ms,
            },
            LineupItem::Offline { .. } => LineupItem::Offline { duration_ms },
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, LineupItem::Offline { .. })
    }

    /// Short tag for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            LineupItem::Content { .. } => "content",
            LineupItem::Redirect { .. } => "redirect",
            LineupItem::Offline { .. } => "offline",
        }
    }
}

/// Ordered, index-stable, cyclic sequence of lineup slots
///
/// Insertion order defines playback order; the sequence wraps after the last
/// item. The logical cycle length is the sum of all slot durations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lineup {
    items: Vec<LineupItem>,
}

impl Lineup {
    pub fn new(items: Vec<LineupItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[LineupItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&LineupItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cycle_length_ms(&self) -> u64 {
        self.items.iter().map(LineupItem::duration_ms).sum()
    }
}

/// A simulated live channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub number: u32,
    /// Instant at which cycle index 0 of the lineup conceptually begins
    pub start_time: DateTime<Utc>,
    /// Items at or below this length are treated as offline/flex for guide purposes
    pub guide_minimum_duration_ms: u64,
    /// Excluded from published guide output, still resolvable for redirects
    pub stealth: bool,
}

/// A lineup slot resolved to a concrete instant on the timeline
///
/// `lineup_index` is absent for synthetic entries (pre-start padding, melded
/// flex blocks) that do not correspond 1:1 to a lineup slot. Values are
/// immutable; redirect composition and melding always produce new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProgram {
    pub lineup_index: Option<usize>,
    pub start: DateTime<Utc>,
    pub item: LineupItem,
}

impl ResolvedProgram {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.item.duration_ms() as i64)
    }
}

/// The complete materialized guide for one channel
///
/// Immutable once published; the cache replaces it wholesale on the next
/// successful build, so readers never observe a partially written guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedGuide {
    pub channel_id: Uuid,
    pub items: Vec<ResolvedProgram>,
    pub built_from: DateTime<Utc>,
    pub built_to: DateTime<Utc>,
}

/// Externally-facing view of a playable unit, supplied by the program materializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProgramView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

/// One published guide row with its display title resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideEntryView {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub title: String,
    /// Present for content entries only
    pub program_id: Option<String>,
}

/// Published guide payload for one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelGuide {
    pub channel_id: Uuid,
    pub channel_name: String,
    pub channel_number: u32,
    pub entries: Vec<GuideEntryView>,
}

/// Aggregate result of one orchestration pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    pub built: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

impl BuildSummary {
    pub fn total(&self) -> usize {
        self.built.len() + self.skipped.len() + self.failed.len()
    }
}

/// Per-channel build bookkeeping exposed through `status()`
#[derive(Debug, Clone, Serialize)]
pub struct ChannelBuildStatus {
    pub channel_id: Uuid,
    pub last_build_at: Option<DateTime<Utc>>,
}

/// Engine-wide status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct GuideStatus {
    pub channels: Vec<ChannelBuildStatus>,
    pub built_channel_ids: Vec<Uuid>,
}
