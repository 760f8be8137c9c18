//! Current-program resolution over cyclic lineups
//!
//! `resolve_at_instant` is the correctness oracle: a modular-arithmetic
//! lookup into the accumulation table. `resolve_next` layers an O(1)
//! incremental advance on top of it and degrades to the oracle whenever any
//! of its preconditions fail. `Resolver` adds cross-channel redirect
//! resolution with loop detection over a build context.

use chrono::{DateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::{GuideError, GuideResult};
use crate::guide::{AccumulationTable, BuildContext, ChannelEntry};
use crate::models::{Channel, Lineup, LineupItem, ResolvedProgram};
use crate::utils::time::{add_ms, ms_between};

/// Synthetic slot answered when a channel has nothing scheduled at all
const NO_PROGRAMS_SLOT_MS: u64 = 30 * 24 * 60 * 60 * 1000;
/// Placeholder substituted for degenerate (zero-length or contentless) items
pub(crate) const DEGENERATE_PLACEHOLDER_MS: u64 = 30 * 60 * 1000;

fn no_programs(instant: DateTime<Utc>) -> ResolvedProgram {
    ResolvedProgram {
        lineup_index: None,
        start: instant,
        item: LineupItem::Offline {
            duration_ms: NO_PROGRAMS_SLOT_MS,
        },
    }
}

/// Resolve the lineup slot playing at `instant`
///
/// Instants before the channel's start time yield a synthetic pre-roll flex
/// entry spanning up to the start; an empty lineup yields a month-long
/// synthetic offline slot.
pub fn resolve_at_instant(
    channel: &Channel,
    lineup: &Lineup,
    table: &AccumulationTable,
    instant: DateTime<Utc>,
) -> GuideResult<ResolvedProgram> {
    if instant < channel.start_time {
        return Ok(ResolvedProgram {
            lineup_index: None,
            start: instant,
            item: LineupItem::Offline {
                duration_ms: ms_between(instant, channel.start_time),
            },
        });
    }
    if lineup.is_empty() {
        return Ok(no_programs(instant));
    }
    let cycle = table.cycle_length_ms();
    if cycle == 0 {
        warn!(
            "Channel '{}' ({}) has a zero-length cycle, treating as offline",
            channel.name, channel.id
        );
        return Ok(no_programs(instant));
    }

    let progress = ms_between(channel.start_time, instant) % cycle;
    let start_of_cycle = instant - chrono::Duration::milliseconds(progress as i64);
    let index = table.index_at(progress).inspect_err(|err| {
        error!(
            "Corrupt accumulation table for channel '{}' ({}) at {}: {}",
            channel.name, channel.id, instant, err
        );
    })?;
    let item = lineup
        .get(index)
        .cloned()
        .ok_or(GuideError::TableInvariant {
            progress,
            cycle_length_ms: cycle,
        })?;

    Ok(ResolvedProgram {
        lineup_index: Some(index),
        start: add_ms(start_of_cycle, table.offset_of(index)),
        item,
    })
}

/// Resolve the slot following `previous`, advancing incrementally when safe
///
/// The fast path only fires when `previous` maps to a real lineup slot, ends
/// exactly at `now`, and still carries (within `slack_ms`) the nominal
/// duration of that slot — anything else (truncated items, redirect-composed
/// durations, synthetic entries) falls back to the oracle.
pub fn resolve_next(
    channel: &Channel,
    lineup: &Lineup,
    table: &AccumulationTable,
    previous: &ResolvedProgram,
    now: DateTime<Utc>,
    slack_ms: u64,
) -> GuideResult<ResolvedProgram> {
    if let Some(index) = previous.lineup_index
        && index < lineup.len()
        && previous.end() == now
        && now >= channel.start_time
        && let Some(nominal) = lineup.get(index)
        && nominal.duration_ms().abs_diff(previous.item.duration_ms()) <= slack_ms
    {
        let next_index = (index + 1) % lineup.len();
        if let Some(item) = lineup.get(next_index) {
            return Ok(ResolvedProgram {
                lineup_index: Some(next_index),
                start: now,
                item: item.clone(),
            });
        }
    }
    resolve_at_instant(channel, lineup, table, now)
}

/// Redirect-aware resolution over a build context
pub struct Resolver<'a> {
    ctx: &'a BuildContext,
    fast_path_slack_ms: u64,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a BuildContext, fast_path_slack_ms: u64) -> Self {
        Self {
            ctx,
            fast_path_slack_ms,
        }
    }

    /// What is playing on `channel_id` at `instant`, redirects resolved
    pub fn resolve_current(
        &self,
        channel_id: Uuid,
        instant: DateTime<Utc>,
    ) -> GuideResult<ResolvedProgram> {
        let entry = self.entry(channel_id)?;
        let base = resolve_at_instant(&entry.channel, &entry.lineup, &entry.table, instant)?;
        let mut visited = vec![channel_id];
        let resolved = self.follow_redirects(base, instant, &mut visited)?;
        Ok(self.repair_degenerate(entry, resolved))
    }

    /// The slot after `previous` on `channel_id`, redirects resolved
    pub fn resolve_following(
        &self,
        channel_id: Uuid,
        previous: &ResolvedProgram,
        now: DateTime<Utc>,
    ) -> GuideResult<ResolvedProgram> {
        let entry = self.entry(channel_id)?;
        let base = resolve_next(
            &entry.channel,
            &entry.lineup,
            &entry.table,
            previous,
            now,
            self.fast_path_slack_ms,
        )?;
        let mut visited = vec![channel_id];
        let resolved = self.follow_redirects(base, now, &mut visited)?;
        Ok(self.repair_degenerate(entry, resolved))
    }

    fn entry(&self, channel_id: Uuid) -> GuideResult<&'a ChannelEntry> {
        self.ctx
            .get(channel_id)
            .ok_or(GuideError::UnknownChannel { channel_id })
    }

    /// Recursively chase redirect slots, composing the result
    ///
    /// The composed program takes the target's content identity but keeps
    /// the source's lineup index, so downstream advancement still walks the
    /// source lineup. Loops and unknown targets degrade to the un-redirected
    /// source slot.
    fn follow_redirects(
        &self,
        source: ResolvedProgram,
        instant: DateTime<Utc>,
        visited: &mut Vec<Uuid>,
    ) -> GuideResult<ResolvedProgram> {
        let LineupItem::Redirect {
            channel_id: target, ..
        } = &source.item
        else {
            return Ok(source);
        };
        let target = *target;

        if visited.contains(&target) {
            warn!(
                "Redirect loop detected (chain {:?} -> {}), keeping un-redirected slot",
                visited, target
            );
            return Ok(source);
        }
        let Some(entry) = self.ctx.get(target) else {
            warn!(
                "Redirect target {} is not a known channel, keeping un-redirected slot",
                target
            );
            return Ok(source);
        };

        visited.push(target);
        let target_base =
            resolve_at_instant(&entry.channel, &entry.lineup, &entry.table, instant)?;
        let target_resolved = self.follow_redirects(target_base, instant, visited)?;

        let start = source.start.max(target_resolved.start);
        let duration_ms = source
            .item
            .duration_ms()
            .min(target_resolved.item.duration_ms());
        Ok(ResolvedProgram {
            lineup_index: source.lineup_index,
            start,
            item: target_resolved.item.with_duration(duration_ms),
        })
    }

    fn repair_degenerate(
        &self,
        entry: &ChannelEntry,
        resolved: ResolvedProgram,
    ) -> ResolvedProgram {
        let contentless = matches!(
            &resolved.item,
            LineupItem::Content { program_id, .. } if program_id.is_empty()
        );
        if resolved.item.duration_ms() == 0 || contentless {
            warn!(
                "Degenerate resolution on channel '{}' ({}): index={:?} kind={} duration={}ms, substituting a 30m offline placeholder",
                entry.channel.name,
                entry.channel.id,
                resolved.lineup_index,
                resolved.item.kind(),
                resolved.item.duration_ms()
            );
            return ResolvedProgram {
                lineup_index: resolved.lineup_index,
                start: resolved.start,
                item: LineupItem::Offline {
                    duration_ms: DEGENERATE_PLACEHOLDER_MS,
                },
            };
        }
        resolved
    }
}
