// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use syslog_sentinel_rs::{
    models::priority::SeverityCategory,
    rules::{AlertRule, Condition, RuleEngine, default_rules},
};

use crate::unit_tests::enrich_message;

fn rule_names(engine: &RuleEngine, raw: &str) -> Vec<String> {
    let record = enrich_message(raw);
    engine
        .evaluate(&record)
        .into_iter()
        .map(|m| m.name)
        .collect()
}

#[test]
fn test_default_library_is_complete() {
    let engine = RuleEngine::new();
    let snapshot = engine.snapshot();
    let names: Vec<&str> = snapshot.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "critical_severity",
            "high_threat_score",
            "auth_failure",
            "security_event",
            "error_spike",
            "brute_force",
            "malware_detected",
            "unauthorized_access",
            "sql_injection",
            "ddos_attack",
        ]
    );
    assert!(snapshot.iter().all(|r| r.enabled));
}

#[test]
fn test_critical_severity_fires_at_two_not_three() {
    let engine = RuleEngine::new();
    assert!(rule_names(&engine, "<130>1 - h a - - - quiet msg")
        .contains(&"critical_severity".to_string()));
    assert!(!rule_names(&engine, "<131>1 - h a - - - quiet msg")
        .contains(&"critical_severity".to_string()));
}

#[test]
fn test_high_threat_score_needs_five_keywords() {
    let engine = RuleEngine::new();
    let fired = rule_names(
        &engine,
        "<134>1 - h a - - - exploit malware trojan backdoor ddos seen",
    );
    assert!(fired.contains(&"high_threat_score".to_string()));

    let not_fired = rule_names(&engine, "<134>1 - h a - - - exploit malware trojan");
    assert!(!not_fired.contains(&"high_threat_score".to_string()));
}

#[test]
fn test_auth_failure_needs_tag_and_failure_word() {
    let engine = RuleEngine::new();

    let fired = rule_names(&engine, "<134>1 - h a - - - login denied for admin");
    assert!(fired.contains(&"auth_failure".to_string()));

    // Authentication tag without a failure word.
    let accepted = rule_names(&engine, "<134>1 - h a - - - login accepted for admin");
    assert!(!accepted.contains(&"auth_failure".to_string()));

    // Failure word without the authentication tag.
    let no_tag = rule_names(&engine, "<134>1 - h a - - - request denied");
    assert!(!no_tag.contains(&"auth_failure".to_string()));
}

#[test]
fn test_error_spike_requires_hostname() {
    let engine = RuleEngine::new();
    // Severity 3 = error with a hostname present.
    assert!(rule_names(&engine, "<131>1 - web a - - - something broke")
        .contains(&"error_spike".to_string()));
    // Fallback records carry no hostname.
    assert!(!rule_names(&engine, "plain unparseable error text")
        .contains(&"error_spike".to_string()));
}

#[test]
fn test_sql_injection_scenario_fires_expected_rules() {
    let engine = RuleEngine::new();
    let fired = rule_names(
        &engine,
        "<131>1 2025-01-01T00:00:00Z h app - - - SQL injection attempt: union select *",
    );

    assert!(fired.contains(&"sql_injection".to_string()));
    // "injection" is a threat keyword, so the security_event rule fires too.
    assert!(fired.contains(&"security_event".to_string()));
    assert!(!fired.contains(&"malware_detected".to_string()));
}

#[test]
fn test_malware_and_unauthorized_and_ddos() {
    let engine = RuleEngine::new();

    let malware = rule_names(&engine, "<134>1 - h a - - - Trojan quarantined");
    assert!(malware.contains(&"malware_detected".to_string()));

    let unauthorized = rule_names(&engine, "<134>1 - h a - - - access denied to vault");
    assert!(unauthorized.contains(&"unauthorized_access".to_string()));

    let ddos = rule_names(&engine, "<134>1 - h a - - - DDoS mitigation engaged");
    assert!(ddos.contains(&"ddos_attack".to_string()));
}

#[test]
fn test_brute_force_message_match() {
    let engine = RuleEngine::new();
    let fired = rule_names(&engine, "<134>1 - h a - - - Brute Force pattern on port 22");
    assert!(fired.contains(&"brute_force".to_string()));
    // "brute force" is also in the threat keyword table.
    assert!(fired.contains(&"security_event".to_string()));
}

#[test]
fn test_disabled_rule_does_not_fire() {
    let engine = RuleEngine::new();
    assert!(engine.disable_rule("critical_severity"));

    let fired = rule_names(&engine, "<130>1 - h a - - - quiet msg");
    assert!(!fired.contains(&"critical_severity".to_string()));

    assert!(engine.enable_rule("critical_severity"));
    let fired = rule_names(&engine, "<130>1 - h a - - - quiet msg");
    assert!(fired.contains(&"critical_severity".to_string()));
}

#[test]
fn test_mutation_operations() {
    let engine = RuleEngine::new();
    let initial = engine.len();

    let custom = AlertRule {
        name: "custom_marker".to_string(),
        description: "fires on a marker token".to_string(),
        severity: SeverityCategory::Low,
        condition: Condition::MessageContainsAny(
            syslog_sentinel_rs::rules::condition::MessageContainsAny::new([
                "marker-token",
            ]),
        ),
        enabled: true,
    };

    assert!(engine.add_rule(custom.clone()));
    // Names are unique.
    assert!(!engine.add_rule(custom));
    assert_eq!(engine.len(), initial + 1);

    assert!(rule_names(&engine, "<134>1 - h a - - - saw marker-token here")
        .contains(&"custom_marker".to_string()));

    assert!(engine.remove_rule("custom_marker"));
    assert!(!engine.remove_rule("custom_marker"));
    assert_eq!(engine.len(), initial);

    assert!(!engine.enable_rule("no_such_rule"));
    assert!(!engine.disable_rule("no_such_rule"));
}

#[test]
fn test_rules_round_trip_as_data() {
    let rules = default_rules();
    let json = serde_json::to_string(&rules).expect("rules serialize");
    let back: Vec<AlertRule> = serde_json::from_str(&json).expect("rules deserialize");
    assert_eq!(rules, back);

    // Spot-check the wire shape of one condition.
    let value = serde_json::to_value(&rules[0].condition).expect("condition serializes");
    assert_eq!(value["op"], "severity_lte");
    assert_eq!(value["max"], 2);
}

#[test]
fn test_concurrent_evaluation_during_mutation() {
    use std::sync::Arc;

    let engine = Arc::new(RuleEngine::new());
    let record = enrich_message("<130>1 - h a - - - concurrent check");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let record = record.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let _ = engine.evaluate(&record);
                }
            })
        })
        .collect();

    for i in 0..50 {
        let name = format!("churn_{i}");
        engine.add_rule(AlertRule {
            name: name.clone(),
            description: "churn".to_string(),
            severity: SeverityCategory::Low,
            condition: Condition::any(vec![]),
            enabled: true,
        });
        engine.remove_rule(&name);
    }

    for reader in readers {
        reader.join().expect("reader thread finished");
    }
}
