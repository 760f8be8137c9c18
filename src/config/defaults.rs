/// Configuration default values
///
/// All defaults live here so tuning the engine is a one-file change.
use std::time::Duration;

// Guide shaping defaults
pub const DEFAULT_MAX_PADDING_LENGTH: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_FLEX_DURATION: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_ALIGNMENT_GRID: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_OFFLINE_TITLE: &str = "Offline";

// Build/retry defaults
pub const DEFAULT_FAST_PATH_SLACK: Duration = Duration::from_secs(2);
pub const DEFAULT_BUILD_MAX_ATTEMPTS: u32 = 15;
pub const DEFAULT_BUILD_INITIAL_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_BUILD_MAX_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_BUILD_RETRY_BUDGET: Duration = Duration::from_secs(30);
pub const DEFAULT_BUILD_JITTER_PERCENT: u8 = 25;

// Background refresh defaults
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

// Export defaults
pub const DEFAULT_EXPORT_ENABLED: bool = true;
pub const DEFAULT_XMLTV_PATH: &str = "./data/xmltv.xml";
