//! Error type definitions for the guide engine

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for guide materialization
///
/// Variants carrying channel/instant context exist so that failures can be
/// logged with enough detail to reconstruct what the engine was doing when
/// they occurred.
#[derive(Error, Debug)]
pub enum GuideError {
    /// An accumulation table cannot be built over zero items
    #[error("cannot build an accumulation table for an empty lineup")]
    EmptyLineup,

    /// Binary-search invariant broken; indicates a corrupt table
    #[error(
        "accumulation table invariant violated: progress {progress}ms has no slot in cycle of {cycle_length_ms}ms"
    )]
    TableInvariant { progress: u64, cycle_length_ms: u64 },

    /// The materialized window has a gap or overlap; programming-bug class
    #[error("guide window for channel {channel_id} is not contiguous at {at}")]
    WindowInvariant {
        channel_id: Uuid,
        at: DateTime<Utc>,
    },

    /// A lineup item with no playable length reached materialization
    #[error("zero-duration lineup item at index {index} on channel {channel_id}")]
    ZeroDurationItem { channel_id: Uuid, index: usize },

    /// Channel id absent from the current build context
    #[error("unknown channel {channel_id}")]
    UnknownChannel { channel_id: Uuid },

    /// The channel has never been built, or its cache entry was dropped
    #[error("no materialized guide available for channel {channel_id}")]
    NotAvailable { channel_id: Uuid },

    /// The cached guide does not reach the requested window end
    #[error(
        "materialized guide for channel {channel_id} ends at {built_to}, requested up to {requested_to}"
    )]
    Stale {
        channel_id: Uuid,
        built_to: DateTime<Utc>,
        requested_to: DateTime<Utc>,
    },

    /// All retry attempts for a channel build were exhausted
    #[error("guide build for channel {channel_id} failed after {attempts} attempts: {message}")]
    BuildFailed {
        channel_id: Uuid,
        attempts: u32,
        message: String,
    },

    /// Lineup source boundary errors
    #[error("lineup source error: {0}")]
    Source(#[from] SourceError),
}

/// Errors produced by the lineup-source boundary
#[derive(Error, Debug)]
pub enum SourceError {
    /// The requested channel does not exist in the source
    #[error("channel {channel_id} not found in lineup source")]
    NotFound { channel_id: Uuid },

    /// Anything the backing store reports (I/O, decode, connectivity)
    #[error("lineup source backend error: {0}")]
    Backend(#[from] anyhow::Error),
}
