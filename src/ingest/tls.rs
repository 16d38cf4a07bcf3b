// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs::File, io::BufReader, sync::Arc};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, select};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{ServerConfig, version},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cfg::config::ReceiverConfig, ingest::RecordQueue, metrics::Metrics,
    models::record::Protocol,
};

/// Loads the certificate chain and private key and builds an acceptor
/// restricted to TLS 1.2 and newer.
fn build_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(
        File::open(cert_path)
            .with_context(|| format!("failed to open tls cert {cert_path}"))?,
    ))
    .collect::<Result<Vec<_>, _>>()
    .context("failed to parse tls certificate chain")?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(
        File::open(key_path)
            .with_context(|| format!("failed to open tls key {key_path}"))?,
    ))
    .context("failed to parse tls key file")?
    .context("tls key file contains no private key")?;

    let config =
        ServerConfig::builder_with_protocol_versions(&[&version::TLS13, &version::TLS12])
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("invalid tls certificate/key pair")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// TLS stream listener: identical framing to the cleartext listener behind a
/// TLS terminator. An error here (bad cert, bind failure) is surfaced to the
/// caller, which downgrades it to a warning; the other listeners keep
/// serving.
pub async fn run(
    cfg: ReceiverConfig,
    queue: RecordQueue,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let acceptor = build_acceptor(&cfg.tls.cert_path, &cfg.tls.key_path)?;

    let addr = format!("{}:{}", cfg.bind_host, cfg.tls.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind tls listener on {addr}"))?;
    info!(%addr, cert_path = %cfg.tls.cert_path, "tls listener started");

    loop {
        let (stream, peer) = select! {
            _ = cancel.cancelled() => break,
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "tls accept failed");
                    continue;
                },
            },
        };

        let source_ip = peer.ip().to_string();
        let acceptor = acceptor.clone();
        let conn_cfg = cfg.clone();
        let conn_queue = queue.clone();
        let conn_metrics = Arc::clone(&metrics);
        let conn_cancel = cancel.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(source_ip, error = %e, "tls handshake failed");
                    conn_metrics
                        .messages_received_total
                        .with_label_values(&["tls", "failed"])
                        .inc();
                    return;
                },
            };
            info!(source_ip, "tls client connected");

            conn_metrics
                .active_connections
                .with_label_values(&["tls"])
                .inc();

            let res = super::drive_stream(
                tls_stream,
                source_ip.clone(),
                Protocol::Tls,
                &conn_cfg,
                conn_queue,
                Arc::clone(&conn_metrics),
                conn_cancel,
            )
            .await;

            conn_metrics
                .active_connections
                .with_label_values(&["tls"])
                .dec();

            match res {
                Ok(()) => info!(source_ip, "tls client disconnected"),
                Err(e) => warn!(source_ip, error = %e, "tls connection closed"),
            }
        });
    }

    info!("tls listener stopped");
    Ok(())
}
