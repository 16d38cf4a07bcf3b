// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use crate::{metrics::Metrics, models::record::EnrichedRecord, store::client::StoreClient};

/// Per-worker buffer in front of the bulk API: flushes at `bulk_size`
/// documents or `bulk_timeout`, whichever comes first. The owning worker
/// awaits flushes, so store latency is the pool's natural backpressure.
pub struct BulkWriter {
    client: Arc<StoreClient>,
    metrics: Arc<Metrics>,
    bulk_size: usize,
    bulk_timeout: std::time::Duration,
    buf: Vec<EnrichedRecord>,
    last_flush: Instant,
}

impl BulkWriter {
    pub fn new(
        client: Arc<StoreClient>,
        metrics: Arc<Metrics>,
        bulk_size: usize,
        bulk_timeout: std::time::Duration,
    ) -> Self {
        Self {
            client,
            metrics,
            bulk_size,
            bulk_timeout,
            buf: Vec::with_capacity(bulk_size),
            last_flush: Instant::now(),
        }
    }

    /// Buffers one record. When the batch fills, it is written out and the
    /// flushed records are returned so the caller can forward them
    /// downstream after the store write.
    pub async fn push(&mut self, record: EnrichedRecord) -> Vec<EnrichedRecord> {
        self.buf.push(record);
        if self.buf.len() >= self.bulk_size {
            return self.flush().await;
        }
        Vec::new()
    }

    /// Time-based flush; called from the worker loop between messages.
    pub async fn tick(&mut self) -> Vec<EnrichedRecord> {
        if !self.buf.is_empty() && self.last_flush.elapsed() >= self.bulk_timeout {
            return self.flush().await;
        }
        Vec::new()
    }

    /// Writes the buffered batch and returns it. Called unconditionally on
    /// drain so shutdown loses nothing buffered.
    pub async fn flush(&mut self) -> Vec<EnrichedRecord> {
        self.last_flush = Instant::now();
        if self.buf.is_empty() {
            return Vec::new();
        }

        let batch = std::mem::take(&mut self.buf);
        self.metrics.batch_size.observe(batch.len() as f64);

        let indexed = self.client.bulk_index(&batch).await;
        info!(total = batch.len(), indexed, "batch indexed");

        batch
    }
}
