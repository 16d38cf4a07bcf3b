// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! UDP/TCP/TLS listeners. All three share one handler contract: decode the
//! frame, run the grammar, and hand the record to the in-process queue the
//! bus publisher drains. Listeners never publish to the bus directly, so a
//! slow broker cannot stall a socket read.

use std::sync::Arc;

use anyhow::{Result, bail};
use bytes::BytesMut;
use tokio::{io::AsyncReadExt, select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cfg::config::ReceiverConfig,
    metrics::Metrics,
    models::record::{Protocol, RawRecord},
    syslog,
};

/// Per-connection TCP state.
pub mod tcp;
/// TLS terminator in front of the stream handler.
pub mod tls;
/// Datagram listener.
pub mod udp;

/// Sender half of the queue between listeners and the bus publisher.
pub type RecordQueue = mpsc::Sender<RawRecord>;

/// Decodes one frame (lossy UTF-8) and runs the grammar. Total, like the
/// grammar itself.
pub(crate) fn decode_frame(data: &[u8], source_ip: &str, protocol: Protocol) -> RawRecord {
    let text = String::from_utf8_lossy(data);
    syslog::parse(&text, source_ip, protocol)
}

/// Drives one stream connection: newline-delimited framing over a growing
/// buffer, bounded by the per-connection hard cap. Returns when the peer
/// closes (leftover partial frame is discarded) or on cancellation.
pub async fn drive_stream<S>(
    mut stream: S,
    source_ip: String,
    protocol: Protocol,
    cfg: &ReceiverConfig,
    queue: RecordQueue,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(cfg.max_message_size);
    let mut chunk = vec![0u8; cfg.max_message_size];

    loop {
        let n = select! {
            _ = cancel.cancelled() => return Ok(()),
            res = stream.read(&mut chunk) => res?,
        };
        if n == 0 {
            // Connection close flushes nothing: a partial frame without its
            // newline is dropped, not emitted.
            if !buf.is_empty() {
                debug!(source_ip, pending = buf.len(), "discarding partial frame on close");
            }
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let frame = buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&frame[..frame.len() - 1]);
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            metrics.message_size_bytes.observe((frame.len() - 1) as f64);
            let record = syslog::parse(line, &source_ip, protocol);
            if queue.send(record).await.is_err() {
                bail!("ingest queue closed");
            }
            metrics
                .messages_received_total
                .with_label_values(&[protocol.as_str(), "success"])
                .inc();
        }

        // A frame larger than one read is permitted, but only up to the
        // hard cap; past that the connection is the problem.
        if buf.len() > cfg.frame_hard_cap {
            metrics
                .messages_received_total
                .with_label_values(&[protocol.as_str(), "failed"])
                .inc();
            bail!(
                "frame exceeds per-connection cap ({} > {})",
                buf.len(),
                cfg.frame_hard_cap
            );
        }
    }
}
