// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::models::priority::{Facility, Severity, SeverityCategory};

/// Wire protocol a message arrived over.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
    Tls,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grammar the message was recognized with.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogFormat {
    #[serde(rename = "RFC5424")]
    Rfc5424,
    #[serde(rename = "RFC3164")]
    Rfc3164,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Fields recovered by the grammar, or the fallback stub when both grammars
/// fail (`format = unknown`, `priority = 13`, user.notice).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub priority: u8,
    pub facility: u8,
    pub facility_name: Facility,
    pub severity: u8,
    pub severity_name: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    /// Timestamp exactly as present in the message; absent when the grammar
    /// did not recognize one. Overwritten with the normalized value during
    /// enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<String>,
    pub message: String,
    pub format: SyslogFormat,
}

/// A message as published by the ingest stage: grammar output plus transport
/// metadata. `received_at` is always present, grammar failure or not.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source_ip: String,
    pub protocol: Protocol,
    /// UTC ISO-8601 arrival timestamp, stamped by the listener.
    pub received_at: String,
    /// Original bytes decoded as UTF-8 with replacement of invalid sequences.
    pub raw: String,
    #[serde(flatten)]
    pub fields: ParsedFields,
}

/// Content-derived tags attached during enrichment.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Security,
    Critical,
    Error,
    Authentication,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw record plus everything the enrichment workers derive from it.
///
/// Serializes flat: the JSON document carries the raw-record keys next to the
/// enrichment keys, matching the store mapping and the bus payloads.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub base: RawRecord,
    /// UTC ISO-8601 time the worker processed the record.
    pub processed_at: String,
    /// Best-effort normalization of the in-message timestamp; falls back to
    /// `received_at` when the original value does not parse.
    pub timestamp_normalized: String,
    pub severity_category: SeverityCategory,
    /// IPv4-looking tokens from the message, in order, duplicates preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_ips: Vec<String>,
    pub has_threat_indicators: bool,
    pub threat_keywords: Vec<String>,
    /// `min(10 * |threat_keywords|, 100)`.
    pub threat_score: u8,
    pub tags: Vec<Tag>,
    /// SHA-256 hex over `hostname|app_name|message|facility|severity`.
    pub fingerprint: String,
    /// `received_at` calendar date in UTC, `YYYY.MM.DD`.
    #[serde(rename = "_index_date")]
    pub index_date: String,
}

impl EnrichedRecord {
    pub fn hostname(&self) -> Option<&str> {
        self.base.fields.hostname.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.base.fields.message
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}
