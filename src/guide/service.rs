//! Guide orchestration service
//!
//! Composes the scheduler, cache and boundary collaborators: loads a fresh
//! lineup snapshot per pass, fans builds out across channels, publishes
//! completion events, serves range queries and drives the XMLTV export.
//! Failures are contained per channel; a pass always runs to the end and
//! reports an aggregate summary.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{Notify, RwLock};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::GuideResult;
use crate::events::{EventSink, GuideEvent};
use crate::guide::cache::GuideCache;
use crate::guide::scheduler::{BuildOutcome, ChannelBuildScheduler};
use crate::guide::BuildContext;
use crate::models::{
    BuildSummary, Channel, ChannelGuide, GuideEntryView, GuideStatus, LineupItem, ResolvedProgram,
};
use crate::sources::{LineupSource, ProgramMaterializer};
use crate::utils::retry::with_retry;
use crate::xmltv::XmltvWriter;

pub struct GuideService {
    config: Config,
    source: Arc<dyn LineupSource>,
    programs: Arc<dyn ProgramMaterializer>,
    events: Arc<dyn EventSink>,
    exporter: XmltvWriter,
    cache: Arc<GuideCache>,
    scheduler: ChannelBuildScheduler,
    /// Channel metadata snapshot, refreshed on every pass, used to render
    /// published views without re-hitting the lineup source
    channels: RwLock<HashMap<Uuid, Channel>>,
    built_notify: Notify,
}

impl GuideService {
    pub fn new(
        config: Config,
        source: Arc<dyn LineupSource>,
        programs: Arc<dyn ProgramMaterializer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let scheduler = ChannelBuildScheduler::new(&config);
        Self {
            config,
            source,
            programs,
            events,
            exporter: XmltvWriter::new(),
            cache: Arc::new(GuideCache::new()),
            scheduler,
            channels: RwLock::new(HashMap::new()),
            built_notify: Notify::new(),
        }
    }

    pub fn cache(&self) -> Arc<GuideCache> {
        self.cache.clone()
    }

    /// Build every channel's guide for `[now, now + window)`
    pub async fn build_all(&self, window: Duration, force: bool) -> GuideResult<BuildSummary> {
        self.build_all_from(window, force, Utc::now()).await
    }

    /// Build every channel's guide for `[start_at, start_at + window)`
    pub async fn build_all_from(
        &self,
        window: Duration,
        force: bool,
        start_at: DateTime<Utc>,
    ) -> GuideResult<BuildSummary> {
        let ctx = self.load_context().await?;
        self.refresh_channel_directory(&ctx).await;

        let ids = ctx.channel_ids();
        info!("Starting guide build pass for {} channels", ids.len());

        let ctx_ref = &ctx;
        let results = join_all(ids.iter().map(|&id| async move {
            (
                id,
                self.scheduler
                    .request_build(ctx_ref, id, window, force, start_at)
                    .await,
            )
        }))
        .await;

        let mut summary = BuildSummary::default();
        for (id, result) in results {
            match result {
                Ok(BuildOutcome::Built(guide)) => {
                    self.publish(guide).await;
                    summary.built.push(id);
                }
                Ok(BuildOutcome::Skipped) => summary.skipped.push(id),
                Err(err) => {
                    error!("Guide build failed for channel {}: {}", id, err);
                    summary.failed.push((id, err.to_string()));
                }
            }
        }

        info!(
            "Guide build pass complete: built={} skipped={} failed={}",
            summary.built.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        self.emit(GuideEvent::GuideRefreshCompleted {
            built: summary.built.len(),
            skipped: summary.skipped.len(),
            failed: summary.failed.len(),
        })
        .await;

        if self.config.export.enabled && !summary.built.is_empty() {
            self.write_export().await;
        }

        // ctx is dropped here; the next pass reloads fresh lineups
        Ok(summary)
    }

    /// Build a single channel's guide
    ///
    /// The full lineup snapshot is still loaded so redirect targets resolve.
    pub async fn build_one(
        &self,
        channel_id: Uuid,
        window: Duration,
        write_export: bool,
        force: bool,
        start_at: Option<DateTime<Utc>>,
    ) -> GuideResult<()> {
        let start_at = start_at.unwrap_or_else(Utc::now);
        let ctx = self.load_context().await?;
        self.refresh_channel_directory(&ctx).await;

        match self
            .scheduler
            .request_build(&ctx, channel_id, window, force, start_at)
            .await?
        {
            BuildOutcome::Built(guide) => self.publish(guide).await,
            BuildOutcome::Skipped => {
                debug!("Guide for channel {} was already fresh", channel_id)
            }
        }

        if write_export && self.config.export.enabled {
            self.write_export().await;
        }
        Ok(())
    }

    /// Published guide rows for one channel, clipped to `[from, to)`
    pub async fn query_channel(
        &self,
        channel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GuideResult<ChannelGuide> {
        let items = self.cache.query_range(channel_id, from, to).await?;
        let directory = self.channels.read().await.clone();
        let channel = directory
            .get(&channel_id)
            .ok_or(crate::errors::GuideError::NotAvailable { channel_id })?;
        let entries = self.render_entries(&directory, &items).await;
        Ok(ChannelGuide {
            channel_id,
            channel_name: channel.name.clone(),
            channel_number: channel.number,
            entries,
        })
    }

    /// Published guide rows for every non-stealth channel
    ///
    /// Channels without a usable cached guide are skipped, not an error.
    pub async fn query_all(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GuideResult<Vec<ChannelGuide>> {
        let mut channels: Vec<Channel> = self
            .channels
            .read()
            .await
            .values()
            .filter(|channel| !channel.stealth)
            .cloned()
            .collect();
        channels.sort_by_key(|channel| channel.number);

        let mut guides = Vec::with_capacity(channels.len());
        for channel in channels {
            match self.query_channel(channel.id, from, to).await {
                Ok(guide) => guides.push(guide),
                Err(err) => debug!(
                    "Skipping channel '{}' ({}) in guide listing: {}",
                    channel.name, channel.id, err
                ),
            }
        }
        Ok(guides)
    }

    /// Per-channel build bookkeeping and the set of built channels
    pub async fn status(&self) -> GuideStatus {
        GuideStatus {
            channels: self.scheduler.status().await,
            built_channel_ids: self.cache.channel_ids().await,
        }
    }

    /// Resolve once a guide for the channel has been published
    ///
    /// Future-based: suspends on a notification instead of polling the
    /// cache.
    pub async fn wait_until_built(&self, channel_id: Uuid) {
        loop {
            let notified = self.built_notify.notified();
            if self.cache.get(channel_id).await.is_some() {
                return;
            }
            notified.await;
        }
    }

    /// Background refresh loop; rebuilds all guides on the configured cadence
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            "Starting guide refresh service (interval {:?}, window {:?})",
            self.config.refresh.interval, self.config.refresh.window
        );
        // the interval's first tick fires immediately, so startup gets a guide
        let mut refresh = interval(self.config.refresh.interval);

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(err) = self.build_all(self.config.refresh.window, false).await {
                        error!("Scheduled guide refresh failed: {}", err);
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Guide refresh service received cancellation signal, shutting down");
                    break;
                }
            }
        }
    }

    /// Snapshot lineups for one pass; loading is transient-failure territory
    /// and runs under the build retry policy
    async fn load_context(&self) -> GuideResult<BuildContext> {
        let retry = self.config.build.retry_policy();
        let ctx = with_retry(
            &retry,
            || async { BuildContext::load(self.source.as_ref()).await },
            "lineup snapshot load",
        )
        .await?;
        Ok(ctx)
    }

    async fn refresh_channel_directory(&self, ctx: &BuildContext) {
        let mut directory = self.channels.write().await;
        directory.clear();
        for id in ctx.channel_ids() {
            if let Some(entry) = ctx.get(id) {
                directory.insert(id, entry.channel.clone());
            }
        }
    }

    async fn publish(&self, guide: crate::models::MaterializedGuide) {
        let channel_id = guide.channel_id;
        let built_from = guide.built_from;
        let built_to = guide.built_to;
        self.cache.put(guide).await;
        self.built_notify.notify_waiters();
        self.emit(GuideEvent::ChannelGuideBuilt {
            channel_id,
            built_from,
            built_to,
        })
        .await;
    }

    async fn emit(&self, event: GuideEvent) {
        if let Err(err) = self.events.publish(event).await {
            warn!("Event sink rejected guide event: {}", err);
        }
    }

    /// Write the XMLTV export; failures are logged and never touch the cache
    async fn write_export(&self) {
        let guides = self.published_guides().await;
        if guides.is_empty() {
            debug!("No published guides yet, skipping XMLTV export");
            return;
        }
        if let Err(err) = self
            .exporter
            .write_file(&self.config.export.xmltv_path, &guides)
            .await
        {
            warn!(
                "XMLTV export failed (cached guides remain servable): {:#}",
                err
            );
        }
    }

    /// Full (unclipped) published views for all non-stealth built channels
    async fn published_guides(&self) -> Vec<ChannelGuide> {
        let directory = self.channels.read().await.clone();
        let mut channels: Vec<&Channel> = directory
            .values()
            .filter(|channel| !channel.stealth)
            .collect();
        channels.sort_by_key(|channel| channel.number);

        let mut guides = Vec::new();
        for channel in channels {
            let Some(cached) = self.cache.get(channel.id).await else {
                continue;
            };
            let entries = self.render_entries(&directory, &cached.items).await;
            guides.push(ChannelGuide {
                channel_id: channel.id,
                channel_name: channel.name.clone(),
                channel_number: channel.number,
                entries,
            });
        }
        guides
    }

    /// Turn resolved programs into display rows, materializing content refs
    async fn render_entries(
        &self,
        directory: &HashMap<Uuid, Channel>,
        items: &[ResolvedProgram],
    ) -> Vec<GuideEntryView> {
        let content_ids: Vec<String> = items
            .iter()
            .filter_map(|prog| match &prog.item {
                LineupItem::Content { program_id, .. } => Some(program_id.clone()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let views = match self.programs.resolve_content_refs(&content_ids).await {
            Ok(views) => views,
            Err(err) => {
                warn!("Program materializer failed, falling back to refs: {:#}", err);
                HashMap::new()
            }
        };

        items
            .iter()
            .map(|prog| {
                let (title, program_id) = match &prog.item {
                    LineupItem::Content { program_id, .. } => (
                        views
                            .get(program_id)
                            .map(|view| view.title.clone())
                            .unwrap_or_else(|| program_id.clone()),
                        Some(program_id.clone()),
                    ),
                    LineupItem::Offline { .. } => {
                        (self.config.guide.offline_title.clone(), None)
                    }
                    LineupItem::Redirect { channel_id, .. } => (
                        directory
                            .get(channel_id)
                            .map(|target| target.name.clone())
                            .unwrap_or_else(|| "Redirect".to_string()),
                        None,
                    ),
                };
                GuideEntryView {
                    start: prog.start,
                    stop: prog.end(),
                    title,
                    program_id,
                }
            })
            .collect()
    }
}
