//! Per-channel build scheduling with mutual exclusion and retry
//!
//! Each channel owns a lazily-created mutex guarding its build state, so
//! builds for the same channel serialize while different channels proceed in
//! parallel. A build runs under the configured retry policy; however it
//! ends, the in-flight marker is cleared so a failed attempt can never wedge
//! the channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{Config, GuideConfig};
use crate::errors::{GuideError, GuideResult};
use crate::guide::{BuildContext, GuideWindowBuilder};
use crate::models::{ChannelBuildStatus, MaterializedGuide};
use crate::utils::retry::{RetryPolicy, with_retry};

/// Transient per-channel build bookkeeping
#[derive(Debug, Default)]
pub struct BuildState {
    /// End of the last successfully built window
    pub last_completed: Option<DateTime<Utc>>,
    /// Set while a build is running, cleared after every attempt
    pub in_flight_since: Option<DateTime<Utc>>,
    /// Window end the current or last build was asked for
    pub requested_end: Option<DateTime<Utc>>,
}

/// Result of a build request
pub enum BuildOutcome {
    Built(MaterializedGuide),
    /// The cached guide still covers the requested instant; nothing to do
    Skipped,
}

pub struct ChannelBuildScheduler {
    guide: GuideConfig,
    fast_path_slack_ms: u64,
    retry: RetryPolicy,
    states: RwLock<HashMap<Uuid, Arc<Mutex<BuildState>>>>,
}

impl ChannelBuildScheduler {
    pub fn new(config: &Config) -> Self {
        Self {
            guide: config.guide.clone(),
            fast_path_slack_ms: config.build.fast_path_slack_ms(),
            retry: config.build.retry_policy(),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Lazily create the state handle for a channel; safe under concurrent
    /// first access from multiple builds
    async fn state_for(&self, channel_id: Uuid) -> Arc<Mutex<BuildState>> {
        if let Some(state) = self.states.read().await.get(&channel_id) {
            return state.clone();
        }
        let mut states = self.states.write().await;
        states.entry(channel_id).or_default().clone()
    }

    /// Build a channel's guide for `[start_at, start_at + window)`
    ///
    /// Serialized per channel. Unless `force` is set, a request whose
    /// instant is still covered by the last successful build is a no-op.
    pub async fn request_build(
        &self,
        ctx: &BuildContext,
        channel_id: Uuid,
        window: Duration,
        force: bool,
        start_at: DateTime<Utc>,
    ) -> GuideResult<BuildOutcome> {
        if ctx.get(channel_id).is_none() {
            return Err(GuideError::UnknownChannel { channel_id });
        }

        let state = self.state_for(channel_id).await;
        let mut guard = state.lock().await;

        if !force && guard.last_completed.is_some_and(|t| t >= start_at) {
            debug!(
                "Guide for channel {} is fresh through {:?}, skipping build",
                channel_id, guard.last_completed
            );
            return Ok(BuildOutcome::Skipped);
        }

        let requested_end = start_at
            + chrono::Duration::milliseconds(window.as_millis().min(i64::MAX as u128) as i64);
        guard.in_flight_since = Some(Utc::now());
        guard.requested_end = Some(requested_end);

        let builder = GuideWindowBuilder::new(ctx, &self.guide, self.fast_path_slack_ms);
        let operation_name = format!("guide build for channel {channel_id}");
        let result = with_retry(
            &self.retry,
            || async { builder.build(channel_id, start_at, requested_end) },
            &operation_name,
        )
        .await;

        guard.in_flight_since = None;
        match result {
            Ok(items) => {
                guard.last_completed = Some(requested_end);
                info!(
                    "Materialized guide for channel {}: {} entries covering {} -> {}",
                    channel_id,
                    items.len(),
                    start_at,
                    requested_end
                );
                Ok(BuildOutcome::Built(MaterializedGuide {
                    channel_id,
                    items,
                    built_from: start_at,
                    built_to: requested_end,
                }))
            }
            Err(err) => {
                // last_completed stays untouched so the next request retries
                // the same window
                error!(
                    "Guide build for channel {} exhausted its retry budget: {}",
                    channel_id, err
                );
                Err(GuideError::BuildFailed {
                    channel_id,
                    attempts: self.retry.max_attempts,
                    message: err.to_string(),
                })
            }
        }
    }

    /// Snapshot of per-channel build times; channels mid-build report `None`
    pub async fn status(&self) -> Vec<ChannelBuildStatus> {
        let states = self.states.read().await;
        let mut out = Vec::with_capacity(states.len());
        for (channel_id, state) in states.iter() {
            let last_build_at = match state.try_lock() {
                Ok(guard) => guard.last_completed,
                Err(_) => None,
            };
            out.push(ChannelBuildStatus {
                channel_id: *channel_id,
                last_build_at,
            });
        }
        out.sort_by_key(|status| status.channel_id);
        out
    }
}
