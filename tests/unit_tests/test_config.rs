// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serial_test::serial;
use syslog_sentinel_rs::cfg::{config::Config, enums::IndexRotation};

fn parse_config(yaml: &str) -> Config {
    let mut cfg: Config = serde_yaml::from_str(yaml).expect("config parses");
    cfg.validate_and_normalize().expect("config validates");
    cfg
}

#[test]
fn test_empty_config_gets_defaults() {
    let cfg = parse_config("{}");

    assert_eq!(cfg.receiver.udp_port, 5514);
    assert_eq!(cfg.receiver.tcp_port, 5515);
    assert_eq!(cfg.receiver.max_message_size, 8192);
    assert_eq!(cfg.receiver.frame_hard_cap, 64 * 1024);
    assert!(!cfg.receiver.tls.enabled);
    assert_eq!(cfg.kafka.topic_raw_logs, "raw-logs");
    assert_eq!(cfg.kafka.topic_processed_logs, "processed-logs");
    assert_eq!(cfg.kafka.topic_alerts, "alerts");
    assert_eq!(cfg.kafka.group_processor, "processor");
    assert_eq!(cfg.kafka.group_alerting, "alerting");
    assert_eq!(cfg.store.bulk_size, 500);
    assert_eq!(cfg.store.bulk_timeout.as_secs(), 30);
    assert_eq!(cfg.store.rotation, IndexRotation::Daily);
    assert_eq!(cfg.processor.workers, 4);
    assert!(cfg.alerting.smtp.is_none());
    assert!(cfg.alerting.webhook_url.is_none());
}

#[test]
fn test_sections_override_defaults() {
    let cfg = parse_config(
        r#"
receiver:
  udp_port: 1514
  tcp_port: 1601
  max_message_size: 4096
store:
  index_prefix: prod-logs
  rotation: weekly
  bulk_size: 250
alerting:
  webhook_url: "https://hooks.example.com/T000/B000"
  smtp:
    host: smtp.example.com
    from_email: alerts@example.com
    to_emails: [oncall@example.com]
"#,
    );

    assert_eq!(cfg.receiver.udp_port, 1514);
    assert_eq!(cfg.receiver.max_message_size, 4096);
    assert_eq!(cfg.store.index_prefix, "prod-logs");
    assert_eq!(cfg.store.rotation, IndexRotation::Weekly);
    assert_eq!(cfg.store.bulk_size, 250);
    assert_eq!(
        cfg.alerting.webhook_url.as_deref(),
        Some("https://hooks.example.com/T000/B000")
    );
    let smtp = cfg.alerting.smtp.expect("smtp section");
    assert_eq!(smtp.host, "smtp.example.com");
    assert_eq!(smtp.port, 587);
    assert_eq!(smtp.to_emails, vec!["oncall@example.com"]);
}

#[test]
fn test_frame_cap_never_below_one_read() {
    let cfg = parse_config(
        r#"
receiver:
  max_message_size: 16384
  frame_hard_cap: 1024
"#,
    );
    assert_eq!(cfg.receiver.frame_hard_cap, 16384);
}

#[test]
fn test_tls_enabled_requires_material() {
    let mut cfg: Config = serde_yaml::from_str(
        r#"
receiver:
  tls:
    enabled: true
"#,
    )
    .expect("config parses");
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn test_zero_workers_rejected() {
    let mut cfg: Config =
        serde_yaml::from_str("processor:\n  workers: 0\n").expect("config parses");
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
#[serial]
fn test_env_overrides_scalars() {
    // Env mutation is process-global; keep these assertions serialized.
    unsafe {
        std::env::set_var("SENTINEL_RECEIVER_UDP_PORT", "9999");
        std::env::set_var("SENTINEL_KAFKA_BOOTSTRAP_SERVERS", "broker-a:9092");
        std::env::set_var("SENTINEL_STORE_ROTATION", "monthly");
        std::env::set_var("SENTINEL_ALERTING_WEBHOOK_URL", "https://hooks/x");
    }

    let mut cfg: Config = serde_yaml::from_str("{}").expect("config parses");
    cfg.apply_env_overrides();
    cfg.validate_and_normalize().expect("config validates");

    assert_eq!(cfg.receiver.udp_port, 9999);
    assert_eq!(cfg.kafka.bootstrap_servers, "broker-a:9092");
    assert_eq!(cfg.store.rotation, IndexRotation::Monthly);
    assert_eq!(cfg.alerting.webhook_url.as_deref(), Some("https://hooks/x"));

    unsafe {
        std::env::remove_var("SENTINEL_RECEIVER_UDP_PORT");
        std::env::remove_var("SENTINEL_KAFKA_BOOTSTRAP_SERVERS");
        std::env::remove_var("SENTINEL_STORE_ROTATION");
        std::env::remove_var("SENTINEL_ALERTING_WEBHOOK_URL");
    }
}

#[test]
#[serial]
fn test_unparseable_env_value_ignored() {
    unsafe {
        std::env::set_var("SENTINEL_RECEIVER_UDP_PORT", "not-a-port");
    }

    let mut cfg: Config = serde_yaml::from_str("{}").expect("config parses");
    cfg.apply_env_overrides();
    assert_eq!(cfg.receiver.udp_port, 5514);

    unsafe {
        std::env::remove_var("SENTINEL_RECEIVER_UDP_PORT");
    }
}
