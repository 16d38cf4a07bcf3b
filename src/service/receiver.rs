// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use tokio::{select, sync::mpsc, task::JoinSet, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    bus::BusProducer,
    cfg::config::Config,
    ingest::{tcp, tls, udp},
    metrics::{self, Metrics},
    models::record::RawRecord,
    service::DRAIN_WINDOW,
};

/// Ingest stage: three listeners feeding a bounded queue, one publisher task
/// draining it into the raw-logs topic.
pub async fn run(
    cfg: Config,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(stage = "receiver", "service starting");

    let metrics_listener = metrics::bind(cfg.metrics.receiver_port).await?;
    tokio::spawn(metrics::serve_on(
        metrics_listener,
        Arc::clone(&metrics),
        cancel.clone(),
    ));

    let producer = BusProducer::start(&cfg.kafka.bootstrap_servers, cfg.kafka.send_retries)
        .await
        .context("receiver cannot reach the bus")?;

    let (tx, mut rx) = mpsc::channel::<RawRecord>(cfg.receiver.queue_capacity);

    let publish_topic = cfg.kafka.topic_raw_logs.clone();
    let publish_producer = producer.clone();
    let publisher = tokio::spawn(async move {
        // Runs until every listener has dropped its sender, then drains what
        // is left in the queue.
        while let Some(record) = rx.recv().await {
            if let Err(e) = publish_producer.send_json(&publish_topic, &record).await {
                error!(error = %e, "raw record publish failed");
            }
        }
    });

    let mut listeners = JoinSet::new();
    listeners.spawn(udp::run(
        cfg.receiver.clone(),
        tx.clone(),
        Arc::clone(&metrics),
        cancel.clone(),
    ));
    listeners.spawn(tcp::run(
        cfg.receiver.clone(),
        tx.clone(),
        Arc::clone(&metrics),
        cancel.clone(),
    ));
    if cfg.receiver.tls.enabled {
        let tls_cfg = cfg.receiver.clone();
        let tls_tx = tx.clone();
        let tls_metrics = Arc::clone(&metrics);
        let tls_cancel = cancel.clone();
        listeners.spawn(async move {
            // Missing or bad TLS material disables this listener only.
            if let Err(e) = tls::run(tls_cfg, tls_tx, tls_metrics, tls_cancel).await {
                warn!(error = %e, "tls listener disabled, continuing without TLS");
            }
            Ok(())
        });
    }
    // Listeners own the only remaining senders; dropping ours lets the
    // publisher observe queue closure at drain time.
    drop(tx);

    info!(stage = "receiver", "service started");

    // A listener returning early with an error (e.g. a port already taken)
    // is fatal; a clean exit only happens after cancellation.
    loop {
        select! {
            _ = cancel.cancelled() => break,
            res = listeners.join_next() => match res {
                Some(Ok(Ok(()))) => continue,
                Some(Ok(Err(e))) => {
                    cancel.cancel();
                    return Err(e.context("listener failed"));
                },
                Some(Err(e)) => {
                    cancel.cancel();
                    bail!("listener task panicked: {e}");
                },
                None => {
                    cancel.cancel();
                    bail!("all listeners exited unexpectedly");
                },
            },
        }
    }

    info!(stage = "receiver", "service stopping");

    // Listeners stop accepting on cancel; wait for them to release their
    // queue senders, then drain the publisher within the window.
    while listeners.join_next().await.is_some() {}
    if timeout(DRAIN_WINDOW, publisher).await.is_err() {
        warn!("publisher drain window elapsed, forcing stop");
    }
    producer.flush(Duration::from_secs(5));

    info!(stage = "receiver", "service stopped");
    Ok(())
}
