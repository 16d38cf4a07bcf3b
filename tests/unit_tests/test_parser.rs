// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use syslog_sentinel_rs::{
    models::{
        priority::{Facility, Severity},
        record::{Protocol, SyslogFormat},
    },
    syslog::{self, GrammarError},
};

#[test]
fn test_rfc5424_full_message() {
    let record = syslog::parse(
        "<134>1 2024-01-15T10:30:00.000Z h app pid - - msg",
        "10.0.0.1",
        Protocol::Udp,
    );

    let fields = &record.fields;
    assert_eq!(fields.format, SyslogFormat::Rfc5424);
    assert_eq!(fields.priority, 134);
    assert_eq!(fields.facility, 16);
    assert_eq!(fields.facility_name, Facility::Local0);
    assert_eq!(fields.severity, 6);
    assert_eq!(fields.severity_name, Severity::Informational);
    assert_eq!(fields.hostname.as_deref(), Some("h"));
    assert_eq!(fields.app_name.as_deref(), Some("app"));
    assert_eq!(fields.proc_id.as_deref(), Some("pid"));
    assert_eq!(fields.msg_id, None);
    assert_eq!(fields.structured_data, None);
    assert_eq!(fields.message, "msg");
    assert_eq!(record.protocol, Protocol::Udp);
    assert!(!record.received_at.is_empty());
}

#[test]
fn test_rfc5424_structured_data_kept() {
    let record = syslog::parse(
        "<34>1 2003-10-11T22:14:15.003Z mymachine su - ID47 [exampleSDID@32473 iut=\"3\"] 'su root' failed",
        "10.0.0.1",
        Protocol::Tcp,
    );

    let fields = &record.fields;
    assert_eq!(fields.format, SyslogFormat::Rfc5424);
    assert_eq!(
        fields.structured_data.as_deref(),
        Some("[exampleSDID@32473 iut=\"3\"]")
    );
    assert_eq!(fields.message, "'su root' failed");
    assert_eq!(fields.facility_name, Facility::Auth);
    assert_eq!(fields.severity_name, Severity::Critical);
}

#[test]
fn test_rfc3164_bsd_timestamp_with_tag_and_pid() {
    let record = syslog::parse(
        "<134>Jan 15 10:30:00 web sshd[42]: Accepted password for root",
        "203.0.113.5",
        Protocol::Udp,
    );

    let fields = &record.fields;
    assert_eq!(fields.format, SyslogFormat::Rfc3164);
    assert_eq!(fields.hostname.as_deref(), Some("web"));
    assert_eq!(fields.app_name.as_deref(), Some("sshd"));
    assert_eq!(fields.proc_id.as_deref(), Some("42"));
    assert_eq!(fields.facility_name, Facility::Local0);
    assert_eq!(fields.severity_name, Severity::Informational);
    assert_eq!(fields.message, "Accepted password for root");
}

#[test]
fn test_rfc3164_without_tag() {
    let record = syslog::parse(
        "<13>2024-01-15 10:30:00 host plain message here",
        "10.0.0.1",
        Protocol::Tcp,
    );

    let fields = &record.fields;
    assert_eq!(fields.format, SyslogFormat::Rfc3164);
    assert_eq!(fields.hostname.as_deref(), Some("host"));
    assert_eq!(fields.app_name, None);
    assert_eq!(fields.proc_id, None);
    assert_eq!(fields.message, "plain message here");
}

#[test]
fn test_malformed_input_degrades_to_fallback() {
    let record = syslog::parse("not a syslog message", "10.0.0.1", Protocol::Udp);

    let fields = &record.fields;
    assert_eq!(fields.format, SyslogFormat::Unknown);
    assert_eq!(fields.priority, 13);
    assert_eq!(fields.facility, 1);
    assert_eq!(fields.facility_name, Facility::User);
    assert_eq!(fields.severity, 5);
    assert_eq!(fields.severity_name, Severity::Notice);
    assert_eq!(fields.message, "not a syslog message");
    assert_eq!(record.raw, "not a syslog message");
    assert!(!record.received_at.is_empty());
}

#[test]
fn test_priority_out_of_range_degrades() {
    // PRI 999 decodes to no valid facility; the record degrades instead of
    // erroring.
    assert_eq!(
        syslog::try_parse("<999>1 - h a p m - msg"),
        Err(GrammarError::PriorityOutOfRange(999))
    );

    let record = syslog::parse("<999>1 - h a p m - msg", "10.0.0.1", Protocol::Udp);
    assert_eq!(record.fields.format, SyslogFormat::Unknown);
    assert_eq!(record.fields.priority, 13);
}

#[test]
fn test_every_parse_stays_in_closed_domains() {
    let inputs = [
        "<0>1 2024-01-01T00:00:00Z h a p m - emergency",
        "<191>Jan  1 00:00:00 h msg",
        "<34>plain",
        "",
        "garbage with no priority",
        "<12>",
    ];
    for input in inputs {
        let record = syslog::parse(input, "10.0.0.1", Protocol::Tls);
        assert!(record.fields.priority <= 191, "priority bound for {input:?}");
        assert!(
            matches!(
                record.fields.format,
                SyslogFormat::Rfc5424 | SyslogFormat::Rfc3164 | SyslogFormat::Unknown
            ),
            "format domain for {input:?}"
        );
        assert!(record.fields.facility <= 23);
        assert!(record.fields.severity <= 7);
    }
}

#[test]
fn test_nil_values_mean_absent() {
    let record = syslog::parse(
        "<165>1 2003-08-24T05:14:15.000003-07:00 host - - - - message",
        "10.0.0.1",
        Protocol::Udp,
    );
    let fields = &record.fields;
    assert_eq!(fields.app_name, None);
    assert_eq!(fields.proc_id, None);
    assert_eq!(fields.msg_id, None);
    assert_eq!(fields.structured_data, None);
    assert_eq!(fields.message, "message");
}
