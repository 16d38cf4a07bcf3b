// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::UdpSocket, select};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cfg::config::ReceiverConfig, ingest::RecordQueue, metrics::Metrics,
    models::record::Protocol,
};

/// Datagram listener: one datagram is one message, capped at
/// `max_message_size`. The handler never awaits the downstream publish; a
/// full queue drops the datagram rather than stalling the socket.
pub async fn run(
    cfg: ReceiverConfig,
    queue: RecordQueue,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", cfg.bind_host, cfg.udp_port);
    let socket = UdpSocket::bind(&addr)
        .await
        .with_context(|| format!("failed to bind udp listener on {addr}"))?;
    info!(%addr, "udp listener started");

    let mut buf = vec![0u8; cfg.max_message_size];
    loop {
        let (n, peer) = select! {
            _ = cancel.cancelled() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "udp recv failed");
                    metrics
                        .messages_received_total
                        .with_label_values(&["udp", "failed"])
                        .inc();
                    continue;
                },
            },
        };

        metrics.message_size_bytes.observe(n as f64);
        let source_ip = peer.ip().to_string();
        let record = super::decode_frame(&buf[..n], &source_ip, Protocol::Udp);

        match queue.try_send(record) {
            Ok(()) => {
                metrics
                    .messages_received_total
                    .with_label_values(&["udp", "success"])
                    .inc();
            },
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                warn!(source_ip, "ingest queue full, dropping datagram");
                metrics
                    .messages_received_total
                    .with_label_values(&["udp", "failed"])
                    .inc();
            },
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    info!("udp listener stopped");
    Ok(())
}
