// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Rule predicates as data: a small operator set composed into a condition
//! tree. Keeping predicates serializable means a rule set can be shipped,
//! stored, and diffed without recompilation.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::models::{
    priority::Severity,
    record::{EnrichedRecord, Tag},
};

#[enum_dispatch]
pub trait Evaluate {
    fn matches(&self, record: &EnrichedRecord) -> bool;
}

/// Numeric severity at or below a threshold (lower is more urgent).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SeverityLte {
    pub max: u8,
}

impl Evaluate for SeverityLte {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.base.fields.severity <= self.max
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ThreatScoreGte {
    pub min: u8,
}

impl Evaluate for ThreatScoreGte {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.threat_score >= self.min
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TagContains {
    pub tag: Tag,
}

impl Evaluate for TagContains {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.has_tag(self.tag)
    }
}

/// Any of the needles as a substring of the lower-cased message. Needles are
/// stored lower-case.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MessageContainsAny {
    pub needles: Vec<String>,
}

impl MessageContainsAny {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl Evaluate for MessageContainsAny {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        let lower = record.message().to_lowercase();
        self.needles.iter().any(|needle| lower.contains(needle))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ThreatKeywordContains {
    pub keyword: String,
}

impl Evaluate for ThreatKeywordContains {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.threat_keywords.iter().any(|kw| kw == &self.keyword)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SeverityNameIs {
    pub name: Severity,
}

impl Evaluate for SeverityNameIs {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.base.fields.severity_name == self.name
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HostnamePresent {}

impl Evaluate for HostnamePresent {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.hostname().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HasThreatIndicators {}

impl Evaluate for HasThreatIndicators {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        record.has_threat_indicators
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AnyOf {
    pub conditions: Vec<Condition>,
}

impl Evaluate for AnyOf {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        self.conditions.iter().any(|c| c.matches(record))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AllOf {
    pub conditions: Vec<Condition>,
}

impl Evaluate for AllOf {
    fn matches(&self, record: &EnrichedRecord) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

#[enum_dispatch(Evaluate)]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    SeverityLte(SeverityLte),
    ThreatScoreGte(ThreatScoreGte),
    TagContains(TagContains),
    MessageContainsAny(MessageContainsAny),
    ThreatKeywordContains(ThreatKeywordContains),
    SeverityNameIs(SeverityNameIs),
    HostnamePresent(HostnamePresent),
    HasThreatIndicators(HasThreatIndicators),
    AnyOf(AnyOf),
    AllOf(AllOf),
}

impl Condition {
    /// `any_of` over a list of conditions.
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::AnyOf(AnyOf { conditions })
    }

    /// `all_of` over a list of conditions.
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::AllOf(AllOf { conditions })
    }
}
