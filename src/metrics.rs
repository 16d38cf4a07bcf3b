// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Prometheus registry shared by a stage's workers, plus the `/metrics`
//! endpoint. Metric names are stable contracts; dashboards depend on them.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry, TextEncoder, exponential_buckets,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Metrics {
    pub registry: Registry,

    // Ingest
    pub messages_received_total: IntCounterVec,
    pub message_size_bytes: Histogram,
    pub active_connections: IntGaugeVec,

    // Enrich + store
    pub messages_consumed_total: IntCounterVec,
    pub messages_processed_total: IntCounterVec,
    pub messages_indexed_total: IntCounterVec,
    pub enrichment_duration_seconds: HistogramVec,
    pub batch_size: Histogram,

    // Evaluate + deliver
    pub logs_evaluated_total: IntCounter,
    pub alerts_triggered_total: IntCounterVec,
    pub alerts_deduplicated_total: IntCounter,
    pub alerts_sent_total: IntCounterVec,
    pub alert_delivery_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new();

        let messages_received_total = IntCounterVec::new(
            Opts::new(
                "messages_received_total",
                "Messages received by the listeners",
            ),
            &["protocol", "status"],
        )?;
        let message_size_bytes = Histogram::with_opts(
            HistogramOpts::new("message_size_bytes", "Size of received messages")
                .buckets(exponential_buckets(64.0, 2.0, 11)?),
        )?;
        let active_connections = IntGaugeVec::new(
            Opts::new("active_connections", "Open stream connections"),
            &["protocol"],
        )?;

        let messages_consumed_total = IntCounterVec::new(
            Opts::new(
                "messages_consumed_total",
                "Messages consumed from the raw-logs bus",
            ),
            &["status"],
        )?;
        let messages_processed_total = IntCounterVec::new(
            Opts::new("messages_processed_total", "Messages enriched"),
            &["status"],
        )?;
        let messages_indexed_total = IntCounterVec::new(
            Opts::new(
                "messages_indexed_total",
                "Documents written to the indexed store",
            ),
            &["status"],
        )?;
        let enrichment_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "enrichment_duration_seconds",
                "Time spent enriching a record",
            ),
            &["enrichment_type"],
        )?;
        let batch_size = Histogram::with_opts(
            HistogramOpts::new("batch_size", "Records per processed batch")
                .buckets(exponential_buckets(1.0, 2.0, 11)?),
        )?;

        let logs_evaluated_total = IntCounter::new(
            "logs_evaluated_total",
            "Records evaluated against the rule set",
        )?;
        let alerts_triggered_total = IntCounterVec::new(
            Opts::new("alerts_triggered_total", "Alerts raised by the rule engine"),
            &["rule_name", "severity"],
        )?;
        let alerts_deduplicated_total = IntCounter::new(
            "alerts_deduplicated_total",
            "Alerts suppressed by the dedup cache",
        )?;
        let alerts_sent_total = IntCounterVec::new(
            Opts::new("alerts_sent_total", "Alert deliveries per channel"),
            &["channel", "status"],
        )?;
        let alert_delivery_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "alert_delivery_duration_seconds",
                "Time spent delivering an alert",
            ),
            &["channel"],
        )?;

        registry.register(Box::new(messages_received_total.clone()))?;
        registry.register(Box::new(message_size_bytes.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(messages_consumed_total.clone()))?;
        registry.register(Box::new(messages_processed_total.clone()))?;
        registry.register(Box::new(messages_indexed_total.clone()))?;
        registry.register(Box::new(enrichment_duration_seconds.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;
        registry.register(Box::new(logs_evaluated_total.clone()))?;
        registry.register(Box::new(alerts_triggered_total.clone()))?;
        registry.register(Box::new(alerts_deduplicated_total.clone()))?;
        registry.register(Box::new(alerts_sent_total.clone()))?;
        registry.register(Box::new(alert_delivery_duration_seconds.clone()))?;

        Ok(Arc::new(Self {
            registry,
            messages_received_total,
            message_size_bytes,
            active_connections,
            messages_consumed_total,
            messages_processed_total,
            messages_indexed_total,
            enrichment_duration_seconds,
            batch_size,
            logs_evaluated_total,
            alerts_triggered_total,
            alerts_deduplicated_total,
            alerts_sent_total,
            alert_delivery_duration_seconds,
        }))
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    match encoder.encode(&metrics.registry.gather(), &mut buf) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buf,
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain".to_string())],
            Vec::new(),
        ),
    }
}

/// Binds the exposition port. Failure here is fatal for the stage: a
/// pipeline nobody can observe must not run silently.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))
}

/// Serves `/metrics` on an already-bound listener until cancellation.
pub async fn serve_on(
    listener: TcpListener,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "metrics server started");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("metrics server failed")
}
