// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result, bail};
use rdkafka::{
    ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

/// Bounded retry applied while the broker comes up.
const START_ATTEMPTS: u32 = 10;
const START_BACKOFF: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON producer shared by a stage's workers. Writes are idempotent with
/// `acks=all` and LZ4-compressed; values carry no key.
#[derive(Clone)]
pub struct BusProducer {
    producer: FutureProducer,
    send_retries: u32,
}

fn producer_config(bootstrap_servers: &str) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", bootstrap_servers)
        .set("compression.codec", "lz4")
        .set("acks", "all")
        .set("enable.idempotence", "true")
        .set("request.timeout.ms", "30000")
        .set("message.timeout.ms", "30000");
    cfg
}

impl BusProducer {
    /// Creates the producer and probes broker metadata, retrying within the
    /// bounded start budget. Exhausting it is fatal for the stage.
    pub async fn start(bootstrap_servers: &str, send_retries: u32) -> Result<Self> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let cfg = producer_config(bootstrap_servers);
            let probe = tokio::task::spawn_blocking(move || -> Result<FutureProducer> {
                let producer: FutureProducer =
                    cfg.create().context("failed to create bus producer")?;
                let client = producer.client();
                client
                    .fetch_metadata(None, METADATA_TIMEOUT)
                    .context("bus metadata probe failed")?;
                Ok(producer)
            })
            .await
            .context("producer probe task panicked")?;

            match probe {
                Ok(producer) => {
                    info!(bootstrap_servers, "bus producer started");
                    return Ok(Self {
                        producer,
                        send_retries,
                    });
                },
                Err(e) if attempt < START_ATTEMPTS => {
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts = START_ATTEMPTS,
                        "bus producer start failed, retrying"
                    );
                    sleep(START_BACKOFF).await;
                },
                Err(e) => {
                    return Err(e.context(format!(
                        "bus producer unavailable after {START_ATTEMPTS} attempts"
                    )));
                },
            }
        }
    }

    /// Publishes a JSON value with bounded retry (`100 ms * 2^n` backoff).
    pub async fn send_json<T: Serialize>(&self, topic: &str, value: &T) -> Result<()> {
        let payload =
            serde_json::to_string(value).context("failed to serialize bus payload")?;

        for attempt in 0..self.send_retries {
            let record = FutureRecord::<(), _>::to(topic).payload(&payload);
            match self
                .producer
                .send(record, Timeout::After(DELIVERY_TIMEOUT))
                .await
            {
                Ok(_) => return Ok(()),
                Err((e, _)) => {
                    warn!(
                        error = %e,
                        topic,
                        attempt = attempt + 1,
                        retries = self.send_retries,
                        "bus send failed"
                    );
                    if attempt + 1 < self.send_retries {
                        sleep(Duration::from_millis(100 * (1 << attempt))).await;
                    }
                },
            }
        }

        bail!("bus send to {topic} failed after {} attempts", self.send_retries)
    }

    /// Flushes buffered deliveries; used during drain.
    pub fn flush(&self, timeout: Duration) {
        if let Err(e) = self.producer.flush(Timeout::After(timeout)) {
            warn!(error = %e, "bus producer flush failed");
        }
    }
}
