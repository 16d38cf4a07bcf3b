// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use syslog_sentinel_rs::{
    alert::DedupCache,
    models::{
        alert::{AlertEvent, DEDUP_TTL_SECS},
        priority::SeverityCategory,
    },
};

use crate::unit_tests::enrich_message;

#[test]
fn test_alert_payload_shape() {
    let enriched = enrich_message("<130>1 - h a - - - paging message");
    let alert = AlertEvent::new(
        "critical_severity",
        "Alert on critical severity logs (emergency, alert, critical)",
        SeverityCategory::Critical,
        enriched,
    );

    let value = serde_json::to_value(&alert).expect("alert serializes");
    assert_eq!(value["rule_name"], "critical_severity");
    assert_eq!(value["severity"], "critical");
    assert!(value["timestamp"].is_string());
    assert!(value["description"].is_string());
    // The whole enriched record rides along for the sinks.
    assert_eq!(value["log_data"]["hostname"], "h");
    assert_eq!(value["log_data"]["severity"], 2);
    assert!(value["log_data"]["fingerprint"].is_string());
}

#[test]
fn test_dedup_key_binds_rule_and_fingerprint() {
    let enriched = enrich_message("<130>1 - h a - - - paging message");
    let fingerprint = enriched.fingerprint.clone();

    let first = AlertEvent::new(
        "critical_severity",
        "desc",
        SeverityCategory::Critical,
        enriched.clone(),
    );
    let second = AlertEvent::new(
        "security_event",
        "desc",
        SeverityCategory::High,
        enriched,
    );

    assert_eq!(
        first.dedup_key(),
        format!("alert:critical_severity:{fingerprint}")
    );
    // Same record, different rule: distinct dedup windows.
    assert_ne!(first.dedup_key(), second.dedup_key());
}

#[test]
fn test_identical_records_share_a_dedup_key() {
    let a = AlertEvent::new(
        "critical_severity",
        "desc",
        SeverityCategory::Critical,
        enrich_message("<130>1 - h a - - - paging message"),
    );
    let b = AlertEvent::new(
        "critical_severity",
        "desc",
        SeverityCategory::Critical,
        enrich_message("<130>1 - h a - - - paging message"),
    );
    assert_eq!(a.dedup_key(), b.dedup_key());
}

#[tokio::test]
async fn test_dedup_fails_open_without_backend() {
    let cache = DedupCache::disabled();
    // No cache means no suppression, ever: over-delivery beats losing a page.
    assert!(!cache.is_duplicate("alert:r:f", DEDUP_TTL_SECS).await);
    assert!(!cache.is_duplicate("alert:r:f", DEDUP_TTL_SECS).await);
}

#[tokio::test]
async fn test_unreachable_cache_fails_open() {
    // Nothing listens on this port; connection setup fails and dedup is
    // disabled rather than blocking alerts.
    let cache = DedupCache::connect("redis://127.0.0.1:1/0").await;
    assert!(!cache.is_duplicate("alert:r:f", DEDUP_TTL_SECS).await);
}
