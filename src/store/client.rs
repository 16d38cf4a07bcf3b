// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use dashmap::DashSet;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    cfg::config::StoreConfig, enrich::received_date, metrics::Metrics,
    models::record::EnrichedRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the indexed document store (OpenSearch-compatible bulk
/// API). Owns the index-name memo: the first writer to a new rollover index
/// creates it with the canonical mapping, everyone else skips the round-trip.
pub struct StoreClient {
    http: reqwest::Client,
    cfg: StoreConfig,
    metrics: Arc<Metrics>,
    known_indices: DashSet<String>,
}

impl StoreClient {
    pub fn new(cfg: StoreConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build store http client")?;

        Ok(Self {
            http,
            cfg,
            metrics,
            known_indices: DashSet::new(),
        })
    }

    /// Rollover index name for one record, `<prefix>-<suffix>`.
    pub fn index_for(&self, record: &EnrichedRecord) -> String {
        let date = received_date(&record.base.received_at);
        format!("{}-{}", self.cfg.index_prefix, self.cfg.rotation.suffix(date))
    }

    /// Creates the index with mapping and settings unless already seen.
    /// Failure here is logged and not fatal: the bulk write decides.
    async fn ensure_index(&self, index: &str) {
        if self.known_indices.contains(index) {
            return;
        }

        let url = format!("{}/{}", self.cfg.endpoint, index);
        let exists = self
            .http
            .head(&url)
            .basic_auth(&self.cfg.username, Some(&self.cfg.password))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false);

        if !exists {
            let res = self
                .http
                .put(&url)
                .basic_auth(&self.cfg.username, Some(&self.cfg.password))
                .json(&index_body())
                .send()
                .await;
            match res {
                Ok(resp) if resp.status().is_success() => {
                    info!(index, "store index created");
                },
                Ok(resp) => {
                    // A racing replica may have created it first; the bulk
                    // write will surface anything real.
                    warn!(index, status = %resp.status(), "store index create rejected");
                },
                Err(e) => {
                    error!(index, error = %e, "store index create failed");
                    return;
                },
            }
        }

        self.known_indices.insert(index.to_string());
    }

    /// Bulk-writes a batch, retrying transport failures up to `max_retries`.
    /// Per-document rejections are counted and do not fail the batch.
    /// Returns the number of documents accepted.
    pub async fn bulk_index(&self, records: &[EnrichedRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }

        let mut body = String::new();
        for record in records {
            let doc = match serde_json::to_string(record) {
                Ok(doc) => doc,
                Err(e) => {
                    error!(error = %e, "store document serialization failed");
                    self.metrics
                        .messages_indexed_total
                        .with_label_values(&["failed"])
                        .inc();
                    continue;
                },
            };

            let index = self.index_for(record);
            self.ensure_index(&index).await;

            body.push_str(&json!({ "index": { "_index": index } }).to_string());
            body.push('\n');
            body.push_str(&doc);
            body.push('\n');
        }

        let url = format!("{}/_bulk", self.cfg.endpoint);
        for attempt in 0..=self.cfg.max_retries {
            let res = self
                .http
                .post(&url)
                .basic_auth(&self.cfg.username, Some(&self.cfg.password))
                .header("content-type", "application/x-ndjson")
                .body(body.clone())
                .send()
                .await;

            match res {
                Ok(resp) if resp.status().is_success() => {
                    return self.account_bulk_response(resp, records.len()).await;
                },
                Ok(resp) => {
                    warn!(
                        status = %resp.status(),
                        attempt = attempt + 1,
                        "store bulk write rejected"
                    );
                },
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "store bulk write failed");
                },
            }

            if attempt < self.cfg.max_retries {
                sleep(Duration::from_millis(500 * u64::from(attempt + 1))).await;
            }
        }

        error!(
            batch = records.len(),
            retries = self.cfg.max_retries,
            "store bulk write exhausted retries"
        );
        self.metrics
            .messages_indexed_total
            .with_label_values(&["failed"])
            .inc_by(records.len() as u64);
        0
    }

    /// Counts per-document outcomes from the bulk response body.
    async fn account_bulk_response(&self, resp: reqwest::Response, total: usize) -> usize {
        let parsed: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                // Accepted on the wire but unreadable; assume delivered.
                warn!(error = %e, "store bulk response unreadable");
                self.metrics
                    .messages_indexed_total
                    .with_label_values(&["success"])
                    .inc_by(total as u64);
                return total;
            },
        };

        let items = parsed
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut success = 0usize;
        let mut failed = 0usize;
        for item in items {
            let status = item
                .get("index")
                .and_then(|op| op.get("status"))
                .and_then(Value::as_u64)
                .unwrap_or(500);
            if status < 300 {
                success += 1;
            } else {
                failed += 1;
                debug!(status, "store document rejected");
            }
        }

        self.metrics
            .messages_indexed_total
            .with_label_values(&["success"])
            .inc_by(success as u64);
        if failed > 0 {
            self.metrics
                .messages_indexed_total
                .with_label_values(&["failed"])
                .inc_by(failed as u64);
            warn!(success, failed, "store bulk partial failure");
        }

        success
    }
}

/// Mapping and settings applied to every new rollover index. Field types are
/// part of the query-side contract.
fn index_body() -> Value {
    json!({
        "mappings": {
            "properties": {
                "timestamp": { "type": "date" },
                "received_at": { "type": "date" },
                "processed_at": { "type": "date" },
                "source_ip": { "type": "ip" },
                "hostname": { "type": "keyword" },
                "facility": { "type": "integer" },
                "facility_name": { "type": "keyword" },
                "severity": { "type": "integer" },
                "severity_name": { "type": "keyword" },
                "severity_category": { "type": "keyword" },
                "message": { "type": "text" },
                "raw": { "type": "text" },
                "protocol": { "type": "keyword" },
                "app_name": { "type": "keyword" },
                "proc_id": { "type": "keyword" },
                "format": { "type": "keyword" },
                "extracted_ips": { "type": "ip" },
                "has_threat_indicators": { "type": "boolean" },
                "threat_keywords": { "type": "keyword" },
                "threat_score": { "type": "integer" },
                "tags": { "type": "keyword" },
                "fingerprint": { "type": "keyword" },
            }
        },
        "settings": {
            "number_of_shards": 3,
            "number_of_replicas": 1,
            "refresh_interval": "5s",
        }
    })
}
