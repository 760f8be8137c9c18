//! Centralized error handling for the guide engine
//!
//! Errors are split into two layers: `GuideError` covers everything the
//! materialization core can produce, while `SourceError` belongs to the
//! lineup-source boundary. Redirect loops and unknown redirect targets are
//! deliberately *not* errors; they degrade to the un-redirected item and a
//! log line, so one misconfigured channel cannot poison a build pass.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using GuideError
pub type GuideResult<T> = Result<T, GuideError>;

/// Convenience type alias for lineup-source Results
pub type SourceResult<T> = Result<T, SourceError>;
