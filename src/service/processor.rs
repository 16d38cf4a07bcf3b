// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{select, task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    bus::{BusConsumer, BusProducer, OffsetReset},
    cfg::config::Config,
    enrich::Enricher,
    metrics::{self, Metrics},
    models::record::{EnrichedRecord, RawRecord},
    service::DRAIN_WINDOW,
    store::{BulkWriter, StoreClient},
};

/// How often an idle worker checks the time-based bulk flush.
const FLUSH_TICK: Duration = Duration::from_secs(1);

/// Enrichment stage: N stateless workers consuming raw records, writing
/// batched documents to the store, and forwarding enriched records to the
/// processed-logs topic.
pub async fn run(
    cfg: Config,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(stage = "processor", "service starting");

    let metrics_listener = metrics::bind(cfg.metrics.processor_port).await?;
    tokio::spawn(metrics::serve_on(
        metrics_listener,
        Arc::clone(&metrics),
        cancel.clone(),
    ));

    let store = Arc::new(StoreClient::new(cfg.store.clone(), Arc::clone(&metrics))?);
    let producer = BusProducer::start(&cfg.kafka.bootstrap_servers, cfg.kafka.send_retries)
        .await
        .context("processor cannot reach the bus")?;

    let mut workers = JoinSet::new();
    for worker_id in 0..cfg.processor.workers {
        // Each worker is its own consumer-group member; the bus balances
        // partitions across them.
        let consumer = BusConsumer::start(
            &cfg.kafka.bootstrap_servers,
            &cfg.kafka.topic_raw_logs,
            &cfg.kafka.group_processor,
            OffsetReset::Earliest,
        )
        .await
        .context("processor cannot join the consumer group")?;

        let writer = BulkWriter::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            cfg.store.bulk_size,
            cfg.store.bulk_timeout,
        );

        workers.spawn(worker_loop(
            worker_id,
            consumer,
            writer,
            producer.clone(),
            cfg.kafka.topic_processed_logs.clone(),
            Arc::clone(&metrics),
            cancel.clone(),
        ));
        info!(worker_id, "processing worker started");
    }

    info!(stage = "processor", workers = cfg.processor.workers, "service started");

    cancel.cancelled().await;
    info!(stage = "processor", "service stopping");

    // Workers flush their buffers on the way out; bound the wait.
    let drain = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(DRAIN_WINDOW, drain).await.is_err() {
        warn!("worker drain window elapsed, forcing stop");
        workers.abort_all();
    }
    producer.flush(Duration::from_secs(5));

    info!(stage = "processor", "service stopped");
    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    consumer: BusConsumer,
    mut writer: BulkWriter,
    producer: BusProducer,
    processed_topic: String,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let enricher = Enricher::new();

    loop {
        let payload = select! {
            _ = cancel.cancelled() => break,
            _ = sleep(FLUSH_TICK) => {
                let flushed = writer.tick().await;
                forward(&producer, &processed_topic, flushed).await;
                continue;
            },
            res = consumer.recv() => match res {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id, error = %e, "bus consume failed");
                    metrics
                        .messages_consumed_total
                        .with_label_values(&["failed"])
                        .inc();
                    sleep(Duration::from_secs(1)).await;
                    continue;
                },
            },
        };

        metrics
            .messages_consumed_total
            .with_label_values(&["success"])
            .inc();

        let record: RawRecord = match serde_json::from_slice(&payload) {
            Ok(record) => record,
            Err(e) => {
                // One undecodable record is that record's problem only.
                error!(worker_id, error = %e, "raw record decode failed");
                metrics
                    .messages_processed_total
                    .with_label_values(&["failed"])
                    .inc();
                continue;
            },
        };

        let timer = metrics
            .enrichment_duration_seconds
            .with_label_values(&["full"])
            .start_timer();
        let enriched = enricher.enrich(record);
        timer.observe_duration();
        metrics
            .messages_processed_total
            .with_label_values(&["success"])
            .inc();

        let flushed = writer.push(enriched).await;
        forward(&producer, &processed_topic, flushed).await;
    }

    // Drain: whatever is buffered goes out before the worker exits.
    let flushed = writer.flush().await;
    forward(&producer, &processed_topic, flushed).await;
    info!(worker_id, "processing worker stopped");
}

/// Forwards store-written records to the processed-logs topic for the
/// evaluator.
async fn forward(producer: &BusProducer, topic: &str, records: Vec<EnrichedRecord>) {
    for record in records {
        if let Err(e) = producer.send_json(topic, &record).await {
            error!(error = %e, "processed record publish failed");
        }
    }
}
