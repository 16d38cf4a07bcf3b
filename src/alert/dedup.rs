// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use redis::aio::ConnectionManager;
use tracing::{info, warn};

/// Shared short-lived-key cache suppressing duplicate alerts across
/// replicas. Fails open everywhere: a missing or broken cache means
/// over-delivery, never under-delivery.
pub struct DedupCache {
    conn: Option<ConnectionManager>,
}

impl DedupCache {
    /// Connects to the cache. A connection failure is a warning, not an
    /// error: the service runs without dedup.
    pub async fn connect(url: &str) -> Self {
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "dedup cache url invalid, dedup disabled");
                return Self { conn: None };
            },
        };

        match ConnectionManager::new(client).await {
            Ok(conn) => {
                info!("dedup cache connected");
                Self { conn: Some(conn) }
            },
            Err(e) => {
                warn!(error = %e, "dedup cache connection failed, dedup disabled");
                Self { conn: None }
            },
        }
    }

    /// Cache without a backend, for tests and degraded startup.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Atomic set-if-absent with TTL. `true` means the key already existed
    /// and this alert must be suppressed.
    pub async fn is_duplicate(&self, key: &str, ttl_secs: u64) -> bool {
        let Some(conn) = &self.conn else {
            return false;
        };
        let mut conn = conn.clone();

        let res: redis::RedisResult<Option<String>> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await;

        match res {
            // SET NX succeeded: first sighting inside the window.
            Ok(Some(_)) => false,
            // nil reply: the key is already present.
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "dedup check failed, failing open");
                false
            },
        }
    }
}
