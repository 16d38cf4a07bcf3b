// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    alert::{ChannelManager, DedupCache},
    bus::{BusConsumer, BusProducer, OffsetReset},
    cfg::config::Config,
    metrics::{self, Metrics},
    models::{
        alert::{AlertEvent, DEDUP_TTL_SECS},
        record::EnrichedRecord,
    },
    rules::RuleEngine,
};

/// Evaluation + delivery stage: every enriched record runs against the rule
/// set; fired rules become deduplicated alerts fanned out to the sinks and
/// the alerts topic.
pub async fn run(
    cfg: Config,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(stage = "alerting", "service starting");

    let metrics_listener = metrics::bind(cfg.metrics.alerting_port).await?;
    tokio::spawn(metrics::serve_on(
        metrics_listener,
        Arc::clone(&metrics),
        cancel.clone(),
    ));

    // Degraded cache is fine; degraded bus is not.
    let dedup = DedupCache::connect(&cfg.redis.url).await;
    let engine = RuleEngine::new();
    let channels = ChannelManager::from_config(&cfg.alerting, Arc::clone(&metrics));

    let producer = BusProducer::start(&cfg.kafka.bootstrap_servers, cfg.kafka.send_retries)
        .await
        .context("alerting cannot reach the bus")?;
    // `latest` on purpose: replaying history would re-page for old incidents.
    let consumer = BusConsumer::start(
        &cfg.kafka.bootstrap_servers,
        &cfg.kafka.topic_processed_logs,
        &cfg.kafka.group_alerting,
        OffsetReset::Latest,
    )
    .await
    .context("alerting cannot join the consumer group")?;

    info!(
        stage = "alerting",
        rules = engine.len(),
        channels = channels.channel_count(),
        "service started"
    );

    loop {
        let payload = select! {
            _ = cancel.cancelled() => break,
            res = consumer.recv() => match res {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "bus consume failed");
                    sleep(Duration::from_secs(1)).await;
                    continue;
                },
            },
        };

        let record: EnrichedRecord = match serde_json::from_slice(&payload) {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "enriched record decode failed");
                continue;
            },
        };

        metrics.logs_evaluated_total.inc();

        for matched in engine.evaluate(&record) {
            let alert = AlertEvent::new(
                matched.name,
                matched.description,
                matched.severity,
                record.clone(),
            );

            if dedup.is_duplicate(&alert.dedup_key(), DEDUP_TTL_SECS).await {
                metrics.alerts_deduplicated_total.inc();
                debug!(
                    rule_name = %alert.rule_name,
                    alert_key = %alert.dedup_key(),
                    "alert deduplicated"
                );
                continue;
            }

            metrics
                .alerts_triggered_total
                .with_label_values(&[alert.rule_name.as_str(), alert.severity.as_str()])
                .inc();
            info!(
                rule_name = %alert.rule_name,
                severity = %alert.severity,
                hostname = alert.log_data.hostname().unwrap_or("-"),
                source_ip = %alert.log_data.base.source_ip,
                "alert triggered"
            );

            // Sink failures are per-channel and already counted; the bus
            // publish happens regardless of sink outcomes.
            channels.send_alert(&alert).await;
            if let Err(e) = producer.send_json(&cfg.kafka.topic_alerts, &alert).await {
                error!(error = %e, rule_name = %alert.rule_name, "alert publish failed");
            }
        }
    }

    info!(stage = "alerting", "service stopping");
    // In-flight sink calls completed above; nothing else to drain but the
    // producer queue.
    producer.flush(Duration::from_secs(5));
    info!(stage = "alerting", "service stopped");
    Ok(())
}
