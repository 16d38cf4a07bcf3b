// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{env, fs, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::{enums::IndexRotation, logger::LogConfig};

/// Environment prefix for scalar overrides, e.g.
/// `SENTINEL_KAFKA_BOOTSTRAP_SERVERS`.
const ENV_PREFIX: &str = "SENTINEL_";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Log level, output and file rotation.
    #[serde(default)]
    pub logger: LogConfig,
    /// Listener ports, frame limits and TLS material for the ingest stage.
    #[serde(default)]
    pub receiver: ReceiverConfig,
    /// Worker counts for the enrichment stage.
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Sink endpoints for the delivery stage.
    #[serde(default)]
    pub alerting: AlertingConfig,
    /// Message-bus bootstrap, topics and consumer groups.
    #[serde(default)]
    pub kafka: KafkaConfig,
    /// Document-store connection, index naming and bulk tuning.
    #[serde(default)]
    pub store: StoreConfig,
    /// Dedup-cache connection.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Per-stage metrics listener ports.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReceiverConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// Cap on a single datagram / single socket read.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Hard cap on bytes buffered between newlines on one stream connection.
    /// A connection exceeding it is closed.
    #[serde(default = "default_frame_hard_cap")]
    pub frame_hard_cap: usize,
    /// Capacity of the in-process queue between listeners and the bus
    /// publisher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tls_port")]
    pub port: u16,
    #[serde(default)]
    pub cert_path: String,
    #[serde(default)]
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_tls_port(),
            cert_path: String::new(),
            key_path: String::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProcessorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AlertingConfig {
    /// Email sink; active when recipients are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
    /// Chat-webhook sink; active when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    #[serde(default)]
    pub to_emails: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct KafkaConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_topic_raw_logs")]
    pub topic_raw_logs: String,
    #[serde(default = "default_topic_processed_logs")]
    pub topic_processed_logs: String,
    #[serde(default = "default_topic_alerts")]
    pub topic_alerts: String,
    #[serde(default = "default_group_processor")]
    pub group_processor: String,
    #[serde(default = "default_group_alerting")]
    pub group_alerting: String,
    /// Per-message send retries on top of librdkafka's own delivery retries.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_store_user")]
    pub username: String,
    #[serde(default = "default_store_user")]
    pub password: String,
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: IndexRotation,
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    #[serde(default = "default_bulk_timeout", with = "serde_secs")]
    pub bulk_timeout: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_receiver_port")]
    pub receiver_port: u16,
    #[serde(default = "default_metrics_processor_port")]
    pub processor_port: u16,
    #[serde(default = "default_metrics_alerting_port")]
    pub alerting_port: u16,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_udp_port() -> u16 {
    5514
}
fn default_tcp_port() -> u16 {
    5515
}
fn default_tls_port() -> u16 {
    5516
}
fn default_max_message_size() -> usize {
    8192
}
fn default_frame_hard_cap() -> usize {
    64 * 1024
}
fn default_queue_capacity() -> usize {
    10_000
}
fn default_workers() -> usize {
    4
}
fn default_smtp_port() -> u16 {
    587
}
fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}
fn default_topic_raw_logs() -> String {
    "raw-logs".to_string()
}
fn default_topic_processed_logs() -> String {
    "processed-logs".to_string()
}
fn default_topic_alerts() -> String {
    "alerts".to_string()
}
fn default_group_processor() -> String {
    "processor".to_string()
}
fn default_group_alerting() -> String {
    "alerting".to_string()
}
fn default_send_retries() -> u32 {
    3
}
fn default_store_endpoint() -> String {
    "http://localhost:9200".to_string()
}
fn default_store_user() -> String {
    "admin".to_string()
}
fn default_index_prefix() -> String {
    "sentinel-logs".to_string()
}
fn default_rotation() -> IndexRotation {
    IndexRotation::Daily
}
fn default_bulk_size() -> usize {
    500
}
fn default_bulk_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_max_retries() -> u32 {
    3
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}
fn default_metrics_receiver_port() -> u16 {
    9101
}
fn default_metrics_processor_port() -> u16 {
    9102
}
fn default_metrics_alerting_port() -> u16 {
    9103
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            udp_port: default_udp_port(),
            tcp_port: default_tcp_port(),
            max_message_size: default_max_message_size(),
            frame_hard_cap: default_frame_hard_cap(),
            queue_capacity: default_queue_capacity(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic_raw_logs: default_topic_raw_logs(),
            topic_processed_logs: default_topic_processed_logs(),
            topic_alerts: default_topic_alerts(),
            group_processor: default_group_processor(),
            group_alerting: default_group_alerting(),
            send_retries: default_send_retries(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
            username: default_store_user(),
            password: default_store_user(),
            index_prefix: default_index_prefix(),
            rotation: default_rotation(),
            bulk_size: default_bulk_size(),
            bulk_timeout: default_bulk_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            receiver_port: default_metrics_receiver_port(),
            processor_port: default_metrics_processor_port(),
            alerting_port: default_metrics_alerting_port(),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, applies environment overrides,
    /// validates invariants, and returns the ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {:?}", path.as_ref())
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.apply_env_overrides();
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Overrides scalar fields from `SENTINEL_*` environment variables.
    /// Unparseable values are ignored in favor of the file value.
    pub fn apply_env_overrides(&mut self) {
        override_from_env(&mut self.logger.level, "LOG_LEVEL");
        override_from_env(&mut self.receiver.udp_port, "RECEIVER_UDP_PORT");
        override_from_env(&mut self.receiver.tcp_port, "RECEIVER_TCP_PORT");
        override_from_env(
            &mut self.receiver.max_message_size,
            "RECEIVER_MAX_MESSAGE_SIZE",
        );
        override_from_env(&mut self.receiver.tls.enabled, "RECEIVER_TLS_ENABLED");
        override_from_env(&mut self.receiver.tls.port, "RECEIVER_TLS_PORT");
        override_from_env(&mut self.receiver.tls.cert_path, "RECEIVER_TLS_CERT_PATH");
        override_from_env(&mut self.receiver.tls.key_path, "RECEIVER_TLS_KEY_PATH");
        override_from_env(&mut self.processor.workers, "PROCESSOR_WORKERS");
        override_from_env(
            &mut self.kafka.bootstrap_servers,
            "KAFKA_BOOTSTRAP_SERVERS",
        );
        override_from_env(&mut self.kafka.topic_raw_logs, "KAFKA_TOPIC_RAW_LOGS");
        override_from_env(
            &mut self.kafka.topic_processed_logs,
            "KAFKA_TOPIC_PROCESSED_LOGS",
        );
        override_from_env(&mut self.kafka.topic_alerts, "KAFKA_TOPIC_ALERTS");
        override_from_env(&mut self.kafka.group_processor, "KAFKA_GROUP_PROCESSOR");
        override_from_env(&mut self.kafka.group_alerting, "KAFKA_GROUP_ALERTING");
        override_from_env(&mut self.store.endpoint, "STORE_ENDPOINT");
        override_from_env(&mut self.store.username, "STORE_USERNAME");
        override_from_env(&mut self.store.password, "STORE_PASSWORD");
        override_from_env(&mut self.store.index_prefix, "STORE_INDEX_PREFIX");
        override_from_env(&mut self.store.bulk_size, "STORE_BULK_SIZE");
        override_from_env(&mut self.store.max_retries, "STORE_MAX_RETRIES");
        if let Ok(v) = env::var(format!("{ENV_PREFIX}STORE_ROTATION"))
            && let Ok(rotation) = serde_yaml::from_str(&v)
        {
            self.store.rotation = rotation;
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}STORE_BULK_TIMEOUT_SECS"))
            && let Ok(secs) = v.parse::<u64>()
        {
            self.store.bulk_timeout = Duration::from_secs(secs);
        }
        override_from_env(&mut self.redis.url, "REDIS_URL");
        if let Ok(v) = env::var(format!("{ENV_PREFIX}ALERTING_WEBHOOK_URL")) {
            self.alerting.webhook_url = Some(v);
        }
        if let Some(smtp) = self.alerting.smtp.as_mut() {
            override_from_env(&mut smtp.host, "SMTP_HOST");
            override_from_env(&mut smtp.port, "SMTP_PORT");
            override_from_env(&mut smtp.username, "SMTP_USERNAME");
            override_from_env(&mut smtp.password, "SMTP_PASSWORD");
            override_from_env(&mut smtp.from_email, "SMTP_FROM_EMAIL");
            if let Ok(v) = env::var(format!("{ENV_PREFIX}SMTP_TO_EMAILS")) {
                smtp.to_emails =
                    v.split(',').map(|s| s.trim().to_string()).collect();
            }
        }
        override_from_env(&mut self.metrics.receiver_port, "METRICS_RECEIVER_PORT");
        override_from_env(&mut self.metrics.processor_port, "METRICS_PROCESSOR_PORT");
        override_from_env(&mut self.metrics.alerting_port, "METRICS_ALERTING_PORT");
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.receiver.udp_port != 0, "receiver.udp_port must be set");
        ensure!(self.receiver.tcp_port != 0, "receiver.tcp_port must be set");
        ensure!(
            self.receiver.max_message_size >= 480,
            "receiver.max_message_size below the RFC 5424 minimum"
        );

        // The stream cap bounds what a single frame may buffer; it can never
        // be tighter than one socket read.
        if self.receiver.frame_hard_cap < self.receiver.max_message_size {
            self.receiver.frame_hard_cap = self.receiver.max_message_size;
        }

        ensure!(
            self.receiver.queue_capacity >= 1,
            "receiver.queue_capacity must be >= 1"
        );
        ensure!(self.processor.workers >= 1, "processor.workers must be >= 1");
        ensure!(self.store.bulk_size >= 1, "store.bulk_size must be >= 1");
        ensure!(
            !self.kafka.bootstrap_servers.is_empty(),
            "kafka.bootstrap_servers must not be empty"
        );

        if self.receiver.tls.enabled {
            ensure!(
                !self.receiver.tls.cert_path.is_empty()
                    && !self.receiver.tls.key_path.is_empty(),
                "receiver.tls requires cert_path and key_path when enabled"
            );
        }

        if let Some(smtp) = &self.alerting.smtp {
            ensure!(
                !smtp.from_email.is_empty(),
                "alerting.smtp.from_email must not be empty"
            );
        }

        Ok(())
    }
}

fn override_from_env<T: FromStr>(target: &mut T, key: &str) {
    if let Ok(v) = env::var(format!("{ENV_PREFIX}{key}"))
        && let Ok(parsed) = v.parse()
    {
        *target = parsed;
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
pub(crate) mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
