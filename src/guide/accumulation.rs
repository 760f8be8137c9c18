//! Prefix-sum duration offsets over a lineup
//!
//! Precomputed once per lineup per build pass, the table answers "which slot
//! is at offset X into the cycle" in O(log n). Rebuilt whenever the lineup
//! changes, never mutated in place.

use crate::errors::{GuideError, GuideResult};
use crate::models::Lineup;

/// Prefix sums of slot durations: `offsets[0] == 0`,
/// `offsets[i + 1] == offsets[i] + items[i].duration_ms`
#[derive(Debug, Clone)]
pub struct AccumulationTable {
    offsets: Vec<u64>,
}

impl AccumulationTable {
    /// Build the table in O(n); fails only on an empty lineup
    pub fn build(lineup: &Lineup) -> GuideResult<Self> {
        if lineup.is_empty() {
            return Err(GuideError::EmptyLineup);
        }
        let mut offsets = Vec::with_capacity(lineup.len() + 1);
        offsets.push(0);
        let mut total = 0u64;
        for item in lineup.items() {
            total += item.duration_ms();
            offsets.push(total);
        }
        Ok(Self { offsets })
    }

    /// Number of lineup slots covered
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total duration of one full pass through the lineup
    pub fn cycle_length_ms(&self) -> u64 {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Offset of slot `index` from the start of the cycle
    pub fn offset_of(&self, index: usize) -> u64 {
        self.offsets[index]
    }

    /// Greatest `i` with `offsets[i] <= progress < offsets[i + 1]`
    ///
    /// `progress` must lie inside the cycle. A result that fails the
    /// invariant means the table no longer matches the lineup it was built
    /// from; that is surfaced, never recovered.
    pub fn index_at(&self, progress: u64) -> GuideResult<usize> {
        let cycle = self.cycle_length_ms();
        let upper = self.offsets.partition_point(|&offset| offset <= progress);
        if upper == 0 || upper > self.len() {
            return Err(GuideError::TableInvariant {
                progress,
                cycle_length_ms: cycle,
            });
        }
        let index = upper - 1;
        if self.offsets[index] <= progress && progress < self.offsets[index + 1] {
            Ok(index)
        } else {
            Err(GuideError::TableInvariant {
                progress,
                cycle_length_ms: cycle,
            })
        }
    }
}
