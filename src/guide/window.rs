//! Window materialization: iterate a channel forward and shape the result
//!
//! The builder walks a channel from `from` to `to`, melding adjacent
//! low-value (offline/flex/too-short) entries so the published guide stays
//! clean, then re-expands any flex block that grew past the configured cap.
//! The output tiles the window exactly: no gaps, no overlaps.

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::GuideConfig;
use crate::errors::{GuideError, GuideResult};
use crate::guide::resolver::{DEGENERATE_PLACEHOLDER_MS, Resolver};
use crate::guide::{BuildContext, ChannelEntry};
use crate::models::{Channel, LineupItem, ResolvedProgram};
use crate::utils::time::{add_ms, align_up_to_grid, ms_between};

/// A guide entry under construction, tagged with whether it consists purely
/// of low-value time (melded flex never counts a real program as low-value)
struct WorkingEntry {
    prog: ResolvedProgram,
    low_value: bool,
}

fn is_low_value(channel: &Channel, item: &LineupItem) -> bool {
    item.is_offline() || item.duration_ms() <= channel.guide_minimum_duration_ms
}

pub struct GuideWindowBuilder<'a> {
    ctx: &'a BuildContext,
    guide: &'a GuideConfig,
    fast_path_slack_ms: u64,
}

impl<'a> GuideWindowBuilder<'a> {
    pub fn new(ctx: &'a BuildContext, guide: &'a GuideConfig, fast_path_slack_ms: u64) -> Self {
        Self {
            ctx,
            guide,
            fast_path_slack_ms,
        }
    }

    /// Materialize `[from, to)` for one channel
    pub fn build(
        &self,
        channel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GuideResult<Vec<ResolvedProgram>> {
        let entry = self
            .ctx
            .get(channel_id)
            .ok_or(GuideError::UnknownChannel { channel_id })?;
        let resolver = Resolver::new(self.ctx, self.fast_path_slack_ms);

        let mut current = resolver.resolve_current(channel_id, from)?;
        if current.item.duration_ms() == 0 {
            return Err(GuideError::ZeroDurationItem {
                channel_id,
                index: current.lineup_index.unwrap_or(0),
            });
        }

        let mut working: Vec<WorkingEntry> = Vec::new();
        let mut melded_ms = 0u64;
        while current.start < to {
            self.push_melded(&entry.channel, &mut working, &mut melded_ms, current.clone());

            let next_instant = current.end();
            let mut candidate = resolver.resolve_following(channel_id, &current, next_instant)?;
            if candidate.start < next_instant {
                candidate = self.reconcile_drift(entry, candidate, next_instant);
            }
            if candidate.item.duration_ms() == 0 {
                return Err(GuideError::ZeroDurationItem {
                    channel_id,
                    index: candidate.lineup_index.unwrap_or(0),
                });
            }
            current = candidate;
        }

        let items = self.expand_flex(working, from);
        self.verify_tiling(channel_id, &items, from, to)?;
        Ok(items)
    }

    /// Melding rule, applied as each resolved item is pushed
    ///
    /// Low-value items merge into the previous entry instead of getting a
    /// row of their own; `melded_ms` tracks how much low-value time has been
    /// folded into the current block. Once that exceeds the padding cap
    /// while sitting on a real program, the excess is split back out as a
    /// standalone offline entry.
    fn push_melded(
        &self,
        channel: &Channel,
        working: &mut Vec<WorkingEntry>,
        melded_ms: &mut u64,
        prog: ResolvedProgram,
    ) {
        let max_padding = self.guide.max_padding_ms();
        let low = is_low_value(channel, &prog.item);

        if low && let Some(prev) = working.last_mut() {
            if prev.low_value || prog.item.duration_ms() <= max_padding {
                let added = prog.item.duration_ms();
                let merged = prev.prog.item.duration_ms() + added;
                prev.prog.item = prev.prog.item.with_duration(merged);
                *melded_ms += added;

                if *melded_ms > max_padding && !prev.low_value {
                    let excess = *melded_ms;
                    let prev_ms = prev.prog.item.duration_ms();
                    if prev_ms > excess {
                        prev.prog.item = prev.prog.item.with_duration(prev_ms - excess);
                        let pad_start = prev.prog.end();
                        working.push(WorkingEntry {
                            prog: ResolvedProgram {
                                lineup_index: None,
                                start: pad_start,
                                item: LineupItem::Offline {
                                    duration_ms: excess,
                                },
                            },
                            low_value: true,
                        });
                    }
                    *melded_ms = 0;
                }
                return;
            }
        }

        working.push(WorkingEntry { prog, low_value: low });
        *melded_ms = 0;
    }

    /// Repair a candidate whose start fell before the expected boundary
    ///
    /// Happens when the underlying content duration changed out from under
    /// the lineup (redirect composition, swapped media). If the nominal slot
    /// is longer than the resolved content, the rest of the slot becomes an
    /// offline pad; otherwise the candidate is shrunk to start exactly at
    /// the boundary.
    fn reconcile_drift(
        &self,
        entry: &ChannelEntry,
        candidate: ResolvedProgram,
        next_instant: DateTime<Utc>,
    ) -> ResolvedProgram {
        let overlap = ms_between(candidate.start, next_instant);
        let resolved_ms = candidate.item.duration_ms();
        let nominal_ms = candidate
            .lineup_index
            .and_then(|index| entry.lineup.get(index))
            .map(LineupItem::duration_ms)
            .unwrap_or(resolved_ms);

        if nominal_ms > resolved_ms {
            let pad_ms = nominal_ms.saturating_sub(overlap);
            if pad_ms > 0 {
                debug!(
                    "Channel '{}': content at index {:?} ran {}ms short of its slot, padding",
                    entry.channel.name,
                    candidate.lineup_index,
                    nominal_ms - resolved_ms
                );
                return ResolvedProgram {
                    lineup_index: candidate.lineup_index,
                    start: next_instant,
                    item: LineupItem::Offline {
                        duration_ms: pad_ms,
                    },
                };
            }
        }

        let shrunk_ms = resolved_ms.saturating_sub(overlap);
        let duration_ms = if shrunk_ms == 0 {
            warn!(
                "Channel '{}': overlap at {} swallowed the whole candidate, substituting a placeholder",
                entry.channel.name, next_instant
            );
            DEGENERATE_PLACEHOLDER_MS
        } else {
            shrunk_ms
        };
        ResolvedProgram {
            lineup_index: candidate.lineup_index,
            start: next_instant,
            item: candidate.item.with_duration(duration_ms),
        }
    }

    /// Re-expand oversized flex blocks into capped sub-entries
    ///
    /// Blocks straddling the window start are first cut at the next grid
    /// boundary so published flex entries do not appear to start in the
    /// past; a final remainder shorter than the padding cap is absorbed into
    /// the last sub-entry rather than left as a sliver.
    fn expand_flex(&self, working: Vec<WorkingEntry>, from: DateTime<Utc>) -> Vec<ResolvedProgram> {
        let max_flex = self.guide.max_flex_ms();
        let max_padding = self.guide.max_padding_ms();
        let grid = self.guide.alignment_grid_ms();

        let mut out = Vec::with_capacity(working.len());
        for entry in working {
            if !entry.low_value || entry.prog.item.duration_ms() <= max_flex {
                out.push(entry.prog);
                continue;
            }

            let prog = entry.prog;
            let end = prog.end();
            let mut cursor = prog.start;
            let mut first = true;

            if prog.start <= from && grid > 0 {
                let aligned = align_up_to_grid(from, grid);
                if aligned > cursor && aligned < end {
                    out.push(sub_entry(&prog, cursor, ms_between(cursor, aligned), first));
                    first = false;
                    cursor = aligned;
                }
            }

            loop {
                let remaining = ms_between(cursor, end);
                if remaining == 0 {
                    break;
                }
                if remaining <= max_flex || remaining - max_flex < max_padding {
                    out.push(sub_entry(&prog, cursor, remaining, first));
                    break;
                }
                out.push(sub_entry(&prog, cursor, max_flex, first));
                first = false;
                cursor = add_ms(cursor, max_flex);
            }
        }
        out
    }

    /// The window must tile `[from, to)` with no gaps or overlaps; anything
    /// else is a programming bug and is surfaced, never papered over
    fn verify_tiling(
        &self,
        channel_id: Uuid,
        items: &[ResolvedProgram],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GuideResult<()> {
        let Some(first) = items.first() else {
            error!("Guide window for channel {} came out empty", channel_id);
            return Err(GuideError::WindowInvariant {
                channel_id,
                at: from,
            });
        };
        if first.start > from {
            error!(
                "Guide window for channel {} starts at {} but was asked for {}",
                channel_id, first.start, from
            );
            return Err(GuideError::WindowInvariant {
                channel_id,
                at: from,
            });
        }
        let mut cursor = first.end();
        for item in &items[1..] {
            if item.start != cursor {
                error!(
                    "Guide window for channel {} is not contiguous: expected {} got {}",
                    channel_id, cursor, item.start
                );
                return Err(GuideError::WindowInvariant {
                    channel_id,
                    at: item.start,
                });
            }
            cursor = item.end();
        }
        if cursor < to {
            error!(
                "Guide window for channel {} ends at {} short of {}",
                channel_id, cursor, to
            );
            return Err(GuideError::WindowInvariant {
                channel_id,
                at: cursor,
            });
        }
        Ok(())
    }
}

fn sub_entry(
    origin: &ResolvedProgram,
    start: DateTime<Utc>,
    duration_ms: u64,
    first: bool,
) -> ResolvedProgram {
    if first {
        ResolvedProgram {
            lineup_index: origin.lineup_index,
            start,
            item: origin.item.with_duration(duration_ms),
        }
    } else {
        ResolvedProgram {
            lineup_index: None,
            start,
            item: LineupItem::Offline { duration_ms },
        }
    }
}
