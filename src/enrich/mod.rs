// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Derivations the worker pool applies to every raw record: indicator
//! extraction, threat scoring, tagging, fingerprinting, timestamp
//! normalization. Pure with respect to I/O so the whole thing is testable
//! without a broker.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::{
    priority::SeverityCategory,
    record::{EnrichedRecord, RawRecord, Tag},
};

/// Fixed indicator table. Matches are case-insensitive against the
/// lower-cased message; order here is the order keywords are reported in.
pub const THREAT_KEYWORDS: [&str; 14] = [
    "exploit",
    "malware",
    "ransomware",
    "trojan",
    "backdoor",
    "injection",
    "xss",
    "sql injection",
    "ddos",
    "brute force",
    "unauthorized",
    "breach",
    "intrusion",
    "anomaly",
];

static IP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ip pattern is valid")
});

#[derive(Debug, Default)]
pub struct Enricher;

impl Enricher {
    pub fn new() -> Self {
        Self
    }

    /// All IPv4-looking tokens in order, duplicates preserved. Octet ranges
    /// are not validated; the store's `ip` field type is the arbiter.
    pub fn extract_ips(&self, message: &str) -> Vec<String> {
        IP_PATTERN
            .find_iter(message)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Keyword intersection with the fixed table, scored 10 points each,
    /// saturating at 100.
    pub fn detect_threats(&self, message: &str) -> (Vec<String>, u8) {
        let lower = message.to_lowercase();
        let detected: Vec<String> = THREAT_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| (*kw).to_string())
            .collect();
        let score = (detected.len() as u64 * 10).min(100) as u8;
        (detected, score)
    }

    /// SHA-256 over `hostname|app_name|message|facility|severity`, missing
    /// fields as empty strings. Identical tuples always collide; that is the
    /// point.
    pub fn fingerprint(&self, record: &RawRecord) -> String {
        let fields = &record.fields;
        let joined = format!(
            "{}|{}|{}|{}|{}",
            fields.hostname.as_deref().unwrap_or(""),
            fields.app_name.as_deref().unwrap_or(""),
            fields.message,
            fields.facility,
            fields.severity,
        );
        hex::encode(Sha256::digest(joined.as_bytes()))
    }

    pub fn enrich(&self, mut record: RawRecord) -> EnrichedRecord {
        let processed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let message_lower = record.fields.message.to_lowercase();

        let extracted_ips = self.extract_ips(&record.fields.message);
        let (threat_keywords, threat_score) = self.detect_threats(&record.fields.message);
        let has_threat_indicators = !threat_keywords.is_empty();

        let severity = record.fields.severity;
        let severity_category = SeverityCategory::from_severity(severity);

        let mut tags = Vec::with_capacity(4);
        if has_threat_indicators {
            tags.push(Tag::Security);
        }
        if severity <= 3 {
            tags.push(Tag::Critical);
        }
        if message_lower.contains("error") || message_lower.contains("fail") {
            tags.push(Tag::Error);
        }
        if message_lower.contains("auth") || message_lower.contains("login") {
            tags.push(Tag::Authentication);
        }

        let fingerprint = self.fingerprint(&record);

        let timestamp_normalized = record
            .fields
            .timestamp
            .as_deref()
            .and_then(|ts| normalize_timestamp(ts, &record.received_at))
            .unwrap_or_else(|| record.received_at.clone());
        // The canonical timestamp always carries the normalized value.
        record.fields.timestamp = Some(timestamp_normalized.clone());

        let index_date = received_date(&record.received_at).format("%Y.%m.%d").to_string();

        EnrichedRecord {
            base: record,
            processed_at,
            timestamp_normalized,
            severity_category,
            extracted_ips,
            has_threat_indicators,
            threat_keywords,
            threat_score,
            tags,
            fingerprint,
            index_date,
        }
    }
}

/// UTC calendar date of `received_at`; the current date when the field does
/// not parse (it is produced in-process, so this is belt only).
pub(crate) fn received_date(received_at: &str) -> chrono::NaiveDate {
    DateTime::parse_from_rfc3339(received_at)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .unwrap_or_else(|_| Utc::now().date_naive())
}

/// Best-effort normalization of an in-message timestamp to UTC ISO-8601.
/// `None` means the caller falls back to `received_at`.
fn normalize_timestamp(ts: &str, received_at: &str) -> Option<String> {
    // ISO-8601 with zone.
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        );
    }

    // ISO-8601 without zone, `T` or space separated; assumed UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(
                naive
                    .and_utc()
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            );
        }
    }

    // BSD form carries no year; borrow it from the arrival time.
    let year = received_date(received_at).year();
    for fmt in ["%Y %b %d %H:%M:%S", "%Y %b %e %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&format!("{year} {ts}"), fmt) {
            return Some(
                naive
                    .and_utc()
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            );
        }
    }

    None
}
