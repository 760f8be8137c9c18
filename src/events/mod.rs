//! Guide-build event notifications
//!
//! Fire-and-forget: a sink failure is logged by the caller and never fails
//! the build that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Events published by the guide engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GuideEvent {
    ChannelGuideBuilt {
        channel_id: Uuid,
        built_from: DateTime<Utc>,
        built_to: DateTime<Utc>,
    },
    GuideRefreshCompleted {
        built: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Destination for guide events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: GuideEvent) -> anyhow::Result<()>;
}

/// Default sink: emits each event as a structured log line
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: GuideEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event)?;
        info!("guide event: {}", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_accepts_events() {
        let sink = TracingEventSink;
        sink.publish(GuideEvent::GuideRefreshCompleted {
            built: 3,
            skipped: 1,
            failed: 0,
        })
        .await
        .unwrap();
    }

    #[test]
    fn events_serialize_with_tags() {
        let event = GuideEvent::ChannelGuideBuilt {
            channel_id: Uuid::nil(),
            built_from: Utc::now(),
            built_to: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"channel_guide_built\""));
    }
}
