//! Millisecond arithmetic over `DateTime<Utc>` instants
//!
//! The engine does all of its math in unsigned milliseconds; these helpers
//! keep the chrono conversions in one place.

use chrono::{DateTime, Utc};

/// Milliseconds from `earlier` to `later`, saturating at zero
pub fn ms_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    (later - earlier).num_milliseconds().max(0) as u64
}

/// Advance an instant by a millisecond count
pub fn add_ms(instant: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    instant + chrono::Duration::milliseconds(ms as i64)
}

/// Round an instant up to the next multiple of `grid_ms` since the epoch
///
/// Instants already on the grid are returned unchanged.
pub fn align_up_to_grid(instant: DateTime<Utc>, grid_ms: u64) -> DateTime<Utc> {
    if grid_ms == 0 {
        return instant;
    }
    let ts = instant.timestamp_millis();
    let rem = ts.rem_euclid(grid_ms as i64);
    if rem == 0 {
        instant
    } else {
        instant + chrono::Duration::milliseconds(grid_ms as i64 - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ms_between_saturates() {
        let a = Utc.timestamp_millis_opt(10_000).unwrap();
        let b = Utc.timestamp_millis_opt(4_000).unwrap();
        assert_eq!(ms_between(a, b), 0);
        assert_eq!(ms_between(b, a), 6_000);
    }

    #[test]
    fn align_rounds_up_to_grid() {
        let grid = 300_000; // 5 minutes
        let on_grid = Utc.timestamp_millis_opt(600_000).unwrap();
        assert_eq!(align_up_to_grid(on_grid, grid), on_grid);

        let off_grid = Utc.timestamp_millis_opt(600_001).unwrap();
        assert_eq!(
            align_up_to_grid(off_grid, grid),
            Utc.timestamp_millis_opt(900_000).unwrap()
        );
    }
}
