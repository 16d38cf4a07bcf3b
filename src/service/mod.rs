// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Stage orchestrators. All three share one lifecycle: start dependencies
//! with bounded retry, spawn workers, wait for a termination signal, drain
//! within a bounded window, stop in reverse order.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Alert evaluation and delivery.
pub mod alerting;
/// Enrichment, indexing and forwarding.
pub mod processor;
/// Listeners and bus publishing.
pub mod receiver;

/// How long a stopping stage waits for in-flight work before forcing the
/// issue.
pub const DRAIN_WINDOW: Duration = Duration::from_secs(30);

/// Cancels the token on SIGINT/SIGTERM. The same token doubles as the
/// programmatic shutdown request.
pub fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                        _ = sigterm.recv() => info!("terminate received"),
                    }
                },
                Err(e) => {
                    warn!(error = %e, "sigterm handler unavailable");
                    let _ = tokio::signal::ctrl_c().await;
                    info!("interrupt received");
                },
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received");
        }
        cancel.cancel();
    });
}
