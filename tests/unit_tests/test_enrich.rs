// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use syslog_sentinel_rs::{
    enrich::Enricher,
    models::{
        priority::SeverityCategory,
        record::{Protocol, Tag},
    },
    syslog,
};

use crate::unit_tests::enrich_message;

#[test]
fn test_threat_scoring_two_keywords() {
    let enriched = enrich_message(
        "<134>1 2024-01-15T10:30:00.000Z h app - - - exploit attempt with malware payload",
    );

    assert_eq!(enriched.threat_keywords, vec!["exploit", "malware"]);
    assert_eq!(enriched.threat_score, 20);
    assert!(enriched.has_threat_indicators);
    assert!(enriched.has_tag(Tag::Security));
}

#[test]
fn test_threat_score_bounded_by_keyword_count() {
    let messages = [
        "<134>1 - h a - - - clean message",
        "<134>1 - h a - - - exploit",
        "<134>1 - h a - - - exploit malware trojan backdoor xss ddos breach",
    ];
    for raw in messages {
        let enriched = enrich_message(raw);
        assert!(enriched.threat_score <= 100);
        assert!(
            enriched.threat_keywords.len() as u32 * 10 >= u32::from(enriched.threat_score),
            "score bound violated for {raw:?}"
        );
        assert_eq!(
            enriched.has_threat_indicators,
            !enriched.threat_keywords.is_empty()
        );
    }
}

#[test]
fn test_extracted_ips_ordered_with_duplicates() {
    let enriched = enrich_message(
        "<134>1 - h a - - - rejected 10.0.0.1 then 192.168.1.9 then 10.0.0.1 again",
    );
    assert_eq!(
        enriched.extracted_ips,
        vec!["10.0.0.1", "192.168.1.9", "10.0.0.1"]
    );
}

#[test]
fn test_octet_ranges_not_validated() {
    let enriched = enrich_message("<134>1 - h a - - - bogus peer 999.999.999.999");
    assert_eq!(enriched.extracted_ips, vec!["999.999.999.999"]);
}

#[test]
fn test_authentication_tag_without_threats() {
    // UDP happy path: an accepted login tags authentication and nothing else
    // threat-related.
    let enriched = enrich_message(
        "<134>Jan 15 10:30:00 web sshd[42]: Accepted password for root",
    );

    assert!(enriched.has_tag(Tag::Authentication));
    assert!(!enriched.has_threat_indicators);
    assert_eq!(enriched.threat_score, 0);
    assert!(!enriched.has_tag(Tag::Security));
}

#[test]
fn test_error_and_critical_tags() {
    let enriched = enrich_message("<131>1 - h a - - - disk failure detected");
    // Severity 3 tags critical; "fail" tags error.
    assert!(enriched.has_tag(Tag::Critical));
    assert!(enriched.has_tag(Tag::Error));
    assert_eq!(enriched.severity_category, SeverityCategory::High);
}

#[test]
fn test_severity_categories_across_the_scale() {
    let cases = [
        (0u8, SeverityCategory::Critical),
        (2, SeverityCategory::Critical),
        (3, SeverityCategory::High),
        (4, SeverityCategory::High),
        (5, SeverityCategory::Medium),
        (6, SeverityCategory::Low),
        (7, SeverityCategory::Low),
    ];
    for (severity, expected) in cases {
        assert_eq!(SeverityCategory::from_severity(severity), expected);
    }
}

#[test]
fn test_fingerprint_depends_on_identity_fields_only() {
    let enricher = Enricher::new();

    let a = syslog::parse(
        "<134>1 2024-01-15T10:30:00Z h app - - - same message",
        "10.0.0.1",
        Protocol::Udp,
    );
    let b = syslog::parse(
        "<134>1 2024-01-15T10:30:00Z h app - - - same message",
        "172.16.0.9",
        Protocol::Tcp,
    );
    // Same (hostname, app_name, message, facility, severity) from different
    // transports: identical fingerprints.
    assert_eq!(enricher.fingerprint(&a), enricher.fingerprint(&b));

    let c = syslog::parse(
        "<134>1 2024-01-15T10:30:00Z h app - - - different message",
        "10.0.0.1",
        Protocol::Udp,
    );
    assert_ne!(enricher.fingerprint(&a), enricher.fingerprint(&c));

    let d = syslog::parse(
        "<135>1 2024-01-15T10:30:00Z h app - - - same message",
        "10.0.0.1",
        Protocol::Udp,
    );
    // Severity differs through the priority byte.
    assert_ne!(enricher.fingerprint(&a), enricher.fingerprint(&d));
}

#[test]
fn test_enriching_twice_is_idempotent() {
    let enricher = Enricher::new();
    let record = syslog::parse(
        "<134>1 2024-01-15T10:30:00Z h app - - - brute force attempt",
        "10.0.0.1",
        Protocol::Udp,
    );

    let first = enricher.enrich(record.clone());
    let second = enricher.enrich(record);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.threat_score, second.threat_score);
    assert_eq!(first.threat_keywords, second.threat_keywords);
}

#[test]
fn test_timestamp_normalized_overwrites_canonical() {
    let enriched = enrich_message("<134>1 2024-01-15T10:30:00.000Z h app - - - msg");
    assert_eq!(
        enriched.base.fields.timestamp.as_deref(),
        Some(enriched.timestamp_normalized.as_str())
    );
    assert!(enriched.timestamp_normalized.starts_with("2024-01-15T10:30:00"));
}

#[test]
fn test_unparseable_timestamp_falls_back_to_received_at() {
    let enriched = enrich_message("<13>weird-token host some message");
    assert_eq!(enriched.timestamp_normalized, enriched.base.received_at);
    assert_eq!(
        enriched.base.fields.timestamp.as_deref(),
        Some(enriched.base.received_at.as_str())
    );
}

#[test]
fn test_index_date_matches_received_date() {
    let enriched = enrich_message("<134>1 2024-01-15T10:30:00Z h app - - - msg");
    let received_day = &enriched.base.received_at[..10];
    assert_eq!(enriched.index_date, received_day.replace('-', "."));
}

#[test]
fn test_enriched_record_serializes_flat() {
    let enriched = enrich_message("<134>1 2024-01-15T10:30:00Z h app - - - exploit");
    let value = serde_json::to_value(&enriched).expect("record serializes");

    // Bus consumers and the store mapping rely on a flat document.
    assert_eq!(value["hostname"], "h");
    assert_eq!(value["protocol"], "udp");
    assert_eq!(value["facility_name"], "local0");
    assert_eq!(value["severity_name"], "informational");
    assert_eq!(value["format"], "RFC5424");
    assert_eq!(value["threat_score"], 10);
    assert_eq!(value["has_threat_indicators"], true);
    assert!(value["_index_date"].is_string());
    assert!(value["fingerprint"].is_string());
}
