// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    models::{
        priority::SeverityCategory,
        record::{EnrichedRecord, Tag},
    },
    rules::condition::{
        Condition, Evaluate, HasThreatIndicators, HostnamePresent, MessageContainsAny,
        SeverityLte, SeverityNameIs, TagContains, ThreatKeywordContains,
        ThreatScoreGte,
    },
};

/// A named predicate over enriched records. Rules are plain data, so a rule
/// set round-trips through JSON.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AlertRule {
    pub name: String,
    pub description: String,
    pub severity: SeverityCategory,
    pub condition: Condition,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// The subset of a rule the delivery path needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub name: String,
    pub description: String,
    pub severity: SeverityCategory,
}

/// Owns the rule set. Mutation goes through `add`/`remove`/`enable`/`disable`
/// under the write lock; evaluation takes the read lock, so concurrent
/// readers never observe a half-applied change.
pub struct RuleEngine {
    rules: RwLock<Vec<AlertRule>>,
}

impl RuleEngine {
    /// Engine preloaded with the default library.
    pub fn new() -> Self {
        let engine = Self::empty();
        for rule in default_rules() {
            engine.add_rule(rule);
        }
        info!(count = engine.len(), "alert rules loaded");
        engine
    }

    pub fn empty() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Adds a rule. Names are unique: a second rule under an existing name
    /// is rejected.
    pub fn add_rule(&self, rule: AlertRule) -> bool {
        let mut rules = self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if rules.iter().any(|r| r.name == rule.name) {
            return false;
        }
        debug!(rule_name = %rule.name, "alert rule added");
        rules.push(rule);
        true
    }

    pub fn remove_rule(&self, name: &str) -> bool {
        let mut rules = self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = rules.len();
        rules.retain(|r| r.name != name);
        let removed = rules.len() < before;
        if removed {
            info!(rule_name = name, "alert rule removed");
        }
        removed
    }

    pub fn enable_rule(&self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    pub fn disable_rule(&self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut rules = self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => {
                rule.enabled = enabled;
                info!(rule_name = name, enabled, "alert rule toggled");
                true
            },
            None => false,
        }
    }

    /// Evaluates one record against every enabled rule. A rule that blows up
    /// is logged and skipped; the rest of the library still runs.
    pub fn evaluate(&self, record: &EnrichedRecord) -> Vec<RuleMatch> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);

        let mut triggered = Vec::new();
        for rule in rules.iter().filter(|r| r.enabled) {
            let fired = catch_unwind(AssertUnwindSafe(|| rule.condition.matches(record)));
            match fired {
                Ok(true) => {
                    debug!(
                        rule_name = %rule.name,
                        severity = %rule.severity,
                        fingerprint = %record.fingerprint,
                        "alert rule triggered"
                    );
                    triggered.push(RuleMatch {
                        name: rule.name.clone(),
                        description: rule.description.clone(),
                        severity: rule.severity,
                    });
                },
                Ok(false) => {},
                Err(_) => {
                    error!(rule_name = %rule.name, "alert rule evaluation failed");
                },
            }
        }
        triggered
    }

    /// Serializable snapshot of the current rule set.
    pub fn snapshot(&self) -> Vec<AlertRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The default library. The trigger semantics are contractual; renaming or
/// retuning a rule here changes what operators get paged for.
pub fn default_rules() -> Vec<AlertRule> {
    use crate::models::priority::Severity;

    vec![
        AlertRule {
            name: "critical_severity".to_string(),
            description: "Alert on critical severity logs (emergency, alert, critical)"
                .to_string(),
            severity: SeverityCategory::Critical,
            condition: Condition::SeverityLte(SeverityLte { max: 2 }),
            enabled: true,
        },
        AlertRule {
            name: "high_threat_score".to_string(),
            description: "Alert on logs with high threat score".to_string(),
            severity: SeverityCategory::High,
            condition: Condition::ThreatScoreGte(ThreatScoreGte { min: 50 }),
            enabled: true,
        },
        AlertRule {
            name: "auth_failure".to_string(),
            description: "Alert on authentication failures".to_string(),
            severity: SeverityCategory::Medium,
            condition: Condition::all(vec![
                Condition::TagContains(TagContains {
                    tag: Tag::Authentication,
                }),
                Condition::MessageContainsAny(MessageContainsAny::new([
                    "failed", "failure", "denied", "rejected",
                ])),
            ]),
            enabled: true,
        },
        AlertRule {
            name: "security_event".to_string(),
            description: "Alert on security-related events".to_string(),
            severity: SeverityCategory::High,
            condition: Condition::any(vec![
                Condition::TagContains(TagContains { tag: Tag::Security }),
                Condition::HasThreatIndicators(HasThreatIndicators {}),
            ]),
            enabled: true,
        },
        AlertRule {
            name: "error_spike".to_string(),
            description: "Alert on error severity from specific host".to_string(),
            severity: SeverityCategory::Medium,
            condition: Condition::all(vec![
                Condition::SeverityNameIs(SeverityNameIs {
                    name: Severity::Error,
                }),
                Condition::HostnamePresent(HostnamePresent {}),
            ]),
            enabled: true,
        },
        AlertRule {
            name: "brute_force".to_string(),
            description: "Alert on potential brute force attempts".to_string(),
            severity: SeverityCategory::High,
            condition: Condition::any(vec![
                Condition::MessageContainsAny(MessageContainsAny::new(["brute force"])),
                Condition::ThreatKeywordContains(ThreatKeywordContains {
                    keyword: "brute_force".to_string(),
                }),
            ]),
            enabled: true,
        },
        AlertRule {
            name: "malware_detected".to_string(),
            description: "Alert on malware-related keywords".to_string(),
            severity: SeverityCategory::Critical,
            condition: Condition::MessageContainsAny(MessageContainsAny::new([
                "malware",
                "ransomware",
                "trojan",
                "virus",
            ])),
            enabled: true,
        },
        AlertRule {
            name: "unauthorized_access".to_string(),
            description: "Alert on unauthorized access attempts".to_string(),
            severity: SeverityCategory::High,
            condition: Condition::MessageContainsAny(MessageContainsAny::new([
                "unauthorized",
                "forbidden",
                "access denied",
            ])),
            enabled: true,
        },
        AlertRule {
            name: "sql_injection".to_string(),
            description: "Alert on potential SQL injection attempts".to_string(),
            severity: SeverityCategory::Critical,
            condition: Condition::any(vec![
                Condition::MessageContainsAny(MessageContainsAny::new(["sql injection"])),
                Condition::ThreatKeywordContains(ThreatKeywordContains {
                    keyword: "sql_injection".to_string(),
                }),
                Condition::MessageContainsAny(MessageContainsAny::new([
                    "union select",
                    "' or '1'='1",
                    "drop table",
                ])),
            ]),
            enabled: true,
        },
        AlertRule {
            name: "ddos_attack".to_string(),
            description: "Alert on DDoS attack indicators".to_string(),
            severity: SeverityCategory::Critical,
            condition: Condition::any(vec![
                Condition::MessageContainsAny(MessageContainsAny::new(["ddos"])),
                Condition::ThreatKeywordContains(ThreatKeywordContains {
                    keyword: "ddos".to_string(),
                }),
            ]),
            enabled: true,
        },
    ]
}
