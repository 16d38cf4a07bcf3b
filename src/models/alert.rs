// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{priority::SeverityCategory, record::EnrichedRecord};

/// Time-to-live of a dedup key. One alert per rule/fingerprint pair within
/// this window.
pub const DEDUP_TTL_SECS: u64 = 3600;

/// An alert as emitted by the rule engine and fanned out to the sinks and the
/// alerts topic.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AlertEvent {
    pub rule_name: String,
    pub description: String,
    pub severity: SeverityCategory,
    /// UTC ISO-8601 time the alert was raised.
    pub timestamp: String,
    pub log_data: EnrichedRecord,
}

impl AlertEvent {
    pub fn new(
        rule_name: impl Into<String>,
        description: impl Into<String>,
        severity: SeverityCategory,
        log_data: EnrichedRecord,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            description: description.into(),
            severity,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            log_data,
        }
    }

    /// Dedup-cache key: `alert:<rule_name>:<fingerprint>`.
    pub fn dedup_key(&self) -> String {
        format!("alert:{}:{}", self.rule_name, self.log_data.fingerprint)
    }
}
