//! Simple jitter utility for retry mechanisms
//!
//! Derives lightweight jitter from system time instead of pulling in a
//! random-number crate.

/// Generate a pseudo-random jitter value between 0 and `max_jitter_ms` (inclusive)
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        % (max_jitter_ms + 1) as u128) as u64
}

/// Jitter as a percentage of a base value
pub fn generate_jitter_percent(base_value: u64, jitter_percent: u8) -> u64 {
    if jitter_percent == 0 || base_value == 0 {
        return 0;
    }

    let max_jitter = (base_value * jitter_percent as u64) / 100;
    generate_jitter_ms(max_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        assert_eq!(generate_jitter_ms(0), 0);
        for _ in 0..100 {
            assert!(generate_jitter_ms(50) <= 50);
        }
    }

    #[test]
    fn percent_jitter_scales_from_base() {
        assert_eq!(generate_jitter_percent(1000, 0), 0);
        assert_eq!(generate_jitter_percent(0, 25), 0);
        for _ in 0..100 {
            assert!(generate_jitter_percent(1000, 25) <= 250);
        }
    }
}
