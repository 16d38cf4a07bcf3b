// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, select};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cfg::config::ReceiverConfig, ingest::RecordQueue, metrics::Metrics,
    models::record::Protocol,
};

/// Cleartext stream listener with newline-delimited framing. Each accepted
/// connection runs in its own task; a bad connection never touches its
/// siblings.
pub async fn run(
    cfg: ReceiverConfig,
    queue: RecordQueue,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", cfg.bind_host, cfg.tcp_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind tcp listener on {addr}"))?;
    info!(%addr, "tcp listener started");

    loop {
        let (stream, peer) = select! {
            _ = cancel.cancelled() => break,
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "tcp accept failed");
                    continue;
                },
            },
        };

        let source_ip = peer.ip().to_string();
        info!(source_ip, "tcp client connected");

        let conn_cfg = cfg.clone();
        let conn_queue = queue.clone();
        let conn_metrics = Arc::clone(&metrics);
        let conn_cancel = cancel.clone();
        tokio::spawn(async move {
            conn_metrics
                .active_connections
                .with_label_values(&["tcp"])
                .inc();

            let res = super::drive_stream(
                stream,
                source_ip.clone(),
                Protocol::Tcp,
                &conn_cfg,
                conn_queue,
                Arc::clone(&conn_metrics),
                conn_cancel,
            )
            .await;

            conn_metrics
                .active_connections
                .with_label_values(&["tcp"])
                .dec();

            match res {
                Ok(()) => info!(source_ip, "tcp client disconnected"),
                Err(e) => warn!(source_ip, error = %e, "tcp connection closed"),
            }
        });
    }

    info!("tcp listener stopped");
    Ok(())
}
