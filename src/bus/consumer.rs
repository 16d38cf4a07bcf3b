// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use rdkafka::{
    ClientConfig, Message,
    consumer::{Consumer, StreamConsumer},
};
use tokio::time::sleep;
use tracing::{info, warn};

const START_ATTEMPTS: u32 = 10;
const START_BACKOFF: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a fresh consumer group begins. The enrichment group replays the
/// backlog; the alerting group intentionally skips it to avoid re-alerting
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl OffsetReset {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// Consumer-group member with 5 s auto-commit.
pub struct BusConsumer {
    consumer: StreamConsumer,
}

impl BusConsumer {
    /// Creates the consumer, probes the topic's metadata with bounded retry,
    /// and subscribes.
    pub async fn start(
        bootstrap_servers: &str,
        topic: &str,
        group_id: &str,
        offset_reset: OffsetReset,
    ) -> Result<Self> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut cfg = ClientConfig::new();
            cfg.set("bootstrap.servers", bootstrap_servers)
                .set("group.id", group_id)
                .set("auto.offset.reset", offset_reset.as_str())
                .set("enable.auto.commit", "true")
                .set("auto.commit.interval.ms", "5000")
                .set("session.timeout.ms", "30000")
                .set("heartbeat.interval.ms", "10000");

            let probe_topic = topic.to_string();
            let probe =
                tokio::task::spawn_blocking(move || -> Result<StreamConsumer> {
                    let consumer: StreamConsumer =
                        cfg.create().context("failed to create bus consumer")?;
                    consumer
                        .fetch_metadata(Some(&probe_topic), METADATA_TIMEOUT)
                        .context("bus metadata probe failed")?;
                    Ok(consumer)
                })
                .await
                .context("consumer probe task panicked")?;

            match probe {
                Ok(consumer) => {
                    consumer
                        .subscribe(&[topic])
                        .with_context(|| format!("failed to subscribe to {topic}"))?;
                    info!(topic, group_id, "bus consumer started");
                    return Ok(Self { consumer });
                },
                Err(e) if attempt < START_ATTEMPTS => {
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts = START_ATTEMPTS,
                        "bus consumer start failed, retrying"
                    );
                    sleep(START_BACKOFF).await;
                },
                Err(e) => {
                    return Err(e.context(format!(
                        "bus consumer unavailable after {START_ATTEMPTS} attempts"
                    )));
                },
            }
        }
    }

    /// Awaits the next message payload. `None` means an empty payload, which
    /// the caller skips; errors are transport-level.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let msg = self
            .consumer
            .recv()
            .await
            .context("bus consume failed")?;
        Ok(msg.payload().map(<[u8]>::to_vec))
    }
}
