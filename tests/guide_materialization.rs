//! End-to-end tests for the guide engine: build passes, range queries,
//! redirects, stealth channels, staleness and the XMLTV export.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use retrotv::config::Config;
use retrotv::errors::GuideError;
use retrotv::events::TracingEventSink;
use retrotv::guide::GuideService;
use retrotv::models::{Channel, Lineup, LineupItem, PublicProgramView};
use retrotv::sources::{InMemoryLineupSource, StaticProgramCatalog};

fn epoch(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn channel(name: &str, number: u32) -> Channel {
    Channel {
        id: Uuid::new_v4(),
        name: name.to_string(),
        number,
        start_time: epoch(0),
        guide_minimum_duration_ms: 0,
        stealth: false,
    }
}

fn content(id: &str, duration_ms: u64) -> LineupItem {
    LineupItem::Content {
        program_id: id.to_string(),
        duration_ms,
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.export.enabled = false;
    config
}

async fn service_with(
    config: Config,
    channels: Vec<(Channel, Lineup)>,
) -> (Arc<GuideService>, Arc<StaticProgramCatalog>) {
    let source = Arc::new(InMemoryLineupSource::new());
    for (channel, lineup) in channels {
        source.insert(channel, lineup).await;
    }
    let catalog = Arc::new(StaticProgramCatalog::new());
    let service = Arc::new(GuideService::new(
        config,
        source,
        catalog.clone(),
        Arc::new(TracingEventSink),
    ));
    (service, catalog)
}

#[tokio::test]
async fn build_pass_materializes_and_serves_queries() {
    let hour = 3_600_000u64;
    let ch = channel("Retro One", 1);
    let id = ch.id;
    let lineup = Lineup::new(vec![content("p1", hour), content("p2", 2 * hour)]);
    let (service, catalog) = service_with(test_config(), vec![(ch, lineup)]).await;
    catalog
        .insert(PublicProgramView {
            id: "p1".into(),
            title: "Morning Show".into(),
            description: None,
        })
        .await;

    let summary = service
        .build_all_from(Duration::from_secs(24 * 3600), false, epoch(0))
        .await
        .unwrap();
    assert_eq!(summary.built.len(), 1);
    assert!(summary.failed.is_empty());

    // query a sub-range; boundary entries come back clipped
    let guide = service
        .query_channel(id, epoch(hour as i64 / 2), epoch(hour as i64 * 2))
        .await
        .unwrap();
    assert_eq!(guide.channel_name, "Retro One");
    assert_eq!(guide.entries.len(), 2);
    assert_eq!(guide.entries[0].start, epoch(hour as i64 / 2));
    assert_eq!(guide.entries[0].title, "Morning Show");
    // p2 has no catalog entry, so its ref is the fallback title
    assert_eq!(guide.entries[1].title, "p2");
    assert_eq!(guide.entries[1].stop, epoch(hour as i64 * 2));
}

#[tokio::test]
async fn second_pass_is_idempotent() {
    let ch = channel("Retro One", 1);
    let lineup = Lineup::new(vec![content("p1", 3_600_000)]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    let window = Duration::from_secs(24 * 3600);
    let first = service.build_all_from(window, false, epoch(0)).await.unwrap();
    assert_eq!(first.built.len(), 1);

    let second = service.build_all_from(window, false, epoch(0)).await.unwrap();
    assert!(second.built.is_empty());
    assert_eq!(second.skipped.len(), 1);

    let forced = service.build_all_from(window, true, epoch(0)).await.unwrap();
    assert_eq!(forced.built.len(), 1);
}

#[tokio::test]
async fn guide_windows_tile_without_gaps() {
    let ch = channel("Tiles", 4);
    let id = ch.id;
    let lineup = Lineup::new(vec![
        content("a", 1_700_000),
        LineupItem::Offline { duration_ms: 300_000 },
        content("b", 2_500_000),
    ]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    service
        .build_all_from(Duration::from_secs(12 * 3600), false, epoch(0))
        .await
        .unwrap();

    let from = epoch(1_000_000);
    let to = epoch(9_000_000);
    let guide = service.query_channel(id, from, to).await.unwrap();
    assert!(!guide.entries.is_empty());
    assert!(guide.entries[0].start <= from);
    for pair in guide.entries.windows(2) {
        assert_eq!(pair[1].start, pair[0].stop, "gap or overlap in guide");
    }
    assert_eq!(guide.entries.last().unwrap().stop, to);
}

#[tokio::test]
async fn redirects_into_stealth_channels_resolve() {
    let mut hidden = channel("Hidden Feed", 99);
    hidden.stealth = true;
    let hidden_id = hidden.id;
    let visible = channel("Front", 1);
    let visible_id = visible.id;

    let (service, catalog) = service_with(
        test_config(),
        vec![
            (
                visible,
                Lineup::new(vec![LineupItem::Redirect {
                    channel_id: hidden_id,
                    duration_ms: 5_000_000,
                }]),
            ),
            (hidden, Lineup::new(vec![content("secret", 3_000_000)])),
        ],
    )
    .await;
    catalog
        .insert(PublicProgramView {
            id: "secret".into(),
            title: "Secret Show".into(),
            description: None,
        })
        .await;

    service
        .build_all_from(Duration::from_secs(4 * 3600), false, epoch(0))
        .await
        .unwrap();

    // the redirect surfaces the hidden channel's content on the visible one
    let guide = service
        .query_channel(visible_id, epoch(0), epoch(3_000_000))
        .await
        .unwrap();
    assert_eq!(guide.entries[0].title, "Secret Show");

    // stealth channels stay out of the published listing
    let listing = service.query_all(epoch(0), epoch(3_000_000)).await.unwrap();
    let numbers: Vec<u32> = listing.iter().map(|g| g.channel_number).collect();
    assert_eq!(numbers, vec![1]);

    // but a direct query still answers
    assert!(
        service
            .query_channel(hidden_id, epoch(0), epoch(3_000_000))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn redirect_loops_do_not_hang_builds() {
    let a = channel("Loop A", 1);
    let b = channel("Loop B", 2);
    let (a_id, b_id) = (a.id, b.id);

    let (service, _) = service_with(
        test_config(),
        vec![
            (
                a,
                Lineup::new(vec![LineupItem::Redirect {
                    channel_id: b_id,
                    duration_ms: 1_800_000,
                }]),
            ),
            (
                b,
                Lineup::new(vec![LineupItem::Redirect {
                    channel_id: a_id,
                    duration_ms: 1_800_000,
                }]),
            ),
        ],
    )
    .await;

    let summary = service
        .build_all_from(Duration::from_secs(4 * 3600), false, epoch(0))
        .await
        .unwrap();
    // both channels still build; the loop degrades instead of failing
    assert_eq!(summary.built.len(), 2);

    let guide = service
        .query_channel(a_id, epoch(0), epoch(1_800_000))
        .await
        .unwrap();
    assert!(!guide.entries.is_empty());
}

#[tokio::test]
async fn empty_lineups_become_offline_channels() {
    let ch = channel("Silence", 9);
    let id = ch.id;
    let (service, _) = service_with(test_config(), vec![(ch, Lineup::default())]).await;

    let summary = service
        .build_all_from(Duration::from_secs(6 * 3600), false, epoch(0))
        .await
        .unwrap();
    assert_eq!(summary.built.len(), 1);

    let guide = service
        .query_channel(id, epoch(0), epoch(3_600_000))
        .await
        .unwrap();
    assert!(!guide.entries.is_empty());
    assert!(guide.entries.iter().all(|entry| entry.title == "Offline"));
}

#[tokio::test]
async fn queries_past_the_horizon_report_staleness() {
    let ch = channel("Short Window", 2);
    let id = ch.id;
    let lineup = Lineup::new(vec![content("p", 3_600_000)]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    service
        .build_all_from(Duration::from_secs(3600), false, epoch(0))
        .await
        .unwrap();

    let result = service
        .query_channel(id, epoch(0), epoch(48 * 3_600_000))
        .await;
    assert!(matches!(result, Err(GuideError::Stale { .. })));

    // a never-built channel is simply not available
    let missing = service
        .query_channel(Uuid::new_v4(), epoch(0), epoch(1000))
        .await;
    assert!(matches!(missing, Err(GuideError::NotAvailable { .. })));
}

#[tokio::test]
async fn status_reports_built_channels() {
    let ch = channel("Status", 3);
    let id = ch.id;
    let lineup = Lineup::new(vec![content("p", 3_600_000)]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    let before = service.status().await;
    assert!(before.built_channel_ids.is_empty());

    service
        .build_all_from(Duration::from_secs(3600), false, epoch(0))
        .await
        .unwrap();

    let after = service.status().await;
    assert_eq!(after.built_channel_ids, vec![id]);
    assert_eq!(after.channels.len(), 1);
    assert_eq!(after.channels[0].last_build_at, Some(epoch(3_600_000)));
}

#[tokio::test]
async fn wait_until_built_wakes_on_publish() {
    let ch = channel("Waiter", 5);
    let id = ch.id;
    let lineup = Lineup::new(vec![content("p", 3_600_000)]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    let waiter = {
        let service = service.clone();
        tokio::spawn(async move {
            tokio::time::timeout(Duration::from_secs(5), service.wait_until_built(id))
                .await
                .expect("waiter timed out");
        })
    };

    service
        .build_all_from(Duration::from_secs(3600), false, epoch(0))
        .await
        .unwrap();
    waiter.await.unwrap();
}

#[tokio::test]
async fn refresh_loop_builds_and_shuts_down() {
    let ch = channel("Looped", 6);
    let id = ch.id;
    let lineup = Lineup::new(vec![content("p", 3_600_000)]);
    let (service, _) = service_with(test_config(), vec![(ch, lineup)]).await;

    let token = CancellationToken::new();
    let runner = {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.run(token).await })
    };

    tokio::time::timeout(Duration::from_secs(5), service.wait_until_built(id))
        .await
        .expect("refresh loop never produced a guide");

    token.cancel();
    runner.await.unwrap();
}

#[tokio::test]
async fn xmltv_export_is_written_after_a_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.xmltv");

    let mut config = Config::default();
    config.export.enabled = true;
    config.export.xmltv_path = path.clone();

    let ch = channel("Export & Co", 8);
    let lineup = Lineup::new(vec![content("p", 3_600_000)]);
    let (service, _) = service_with(config, vec![(ch, lineup)]).await;

    service
        .build_all_from(Duration::from_secs(3600), false, epoch(0))
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("<display-name>Export &amp; Co</display-name>"));
    assert!(contents.contains("<programme"));
}
