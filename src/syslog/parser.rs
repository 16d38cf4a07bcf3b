// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The two syslog grammars and the degradation path.
//!
//! A message is tried against RFC 5424 first, then RFC 3164. When both fail
//! (or PRI is out of `[0, 191]`) the caller gets a fallback record stamped
//! `format = unknown` with priority 13 (user.notice). A malformed message is
//! still a message, never an error.

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    priority::{Facility, Severity, decode_priority},
    record::{ParsedFields, Protocol, RawRecord, SyslogFormat},
};

/// `<PRI>VER TIMESTAMP HOSTNAME APP PROCID MSGID SD MSG`, SD either `-` or
/// one or more bracketed sections.
static RFC5424: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^<(?P<priority>\d+)>(?P<version>\d+)\s+(?P<timestamp>\S+)\s+(?P<hostname>\S+)\s+(?P<app_name>\S+)\s+(?P<proc_id>\S+)\s+(?P<msg_id>\S+)\s+(?P<structured_data>(?:\[.*?\]|-)+)\s*(?P<message>.*)$",
    )
    .expect("rfc5424 pattern is valid")
});

/// `<PRI>TIMESTAMP HOSTNAME (TAG[PID]:)? MSG`. The timestamp alternation
/// accepts the BSD form, ISO-8601 with or without a zone, or any
/// non-whitespace token.
static RFC3164: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^<(?P<priority>\d+)>(?P<timestamp>(?:\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2}|\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}|\S+))\s+(?P<hostname>\S+)\s+(?:(?P<tag>[^:\s]+)(?:\[(?P<pid>\d+)\])?:\s*)?(?P<message>.*)$",
    )
    .expect("rfc3164 pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    /// PRI decoded but exceeds the valid syslog range.
    #[error("priority {0} out of range [0, 191]")]
    PriorityOutOfRange(u32),
    /// Neither grammar recognized the message.
    #[error("message matches neither RFC 5424 nor RFC 3164")]
    NoMatch,
}

fn nil_to_none(s: &str) -> Option<String> {
    (s != "-").then(|| s.to_string())
}

fn try_rfc5424(raw: &str) -> Result<ParsedFields, GrammarError> {
    let caps = RFC5424.captures(raw).ok_or(GrammarError::NoMatch)?;

    let priority: u32 = caps["priority"].parse().map_err(|_| GrammarError::NoMatch)?;
    let pri =
        u8::try_from(priority).map_err(|_| GrammarError::PriorityOutOfRange(priority))?;
    let (facility, facility_name, severity, severity_name) =
        decode_priority(pri).ok_or(GrammarError::PriorityOutOfRange(priority))?;

    Ok(ParsedFields {
        priority: pri,
        facility,
        facility_name,
        severity,
        severity_name,
        version: caps["version"].parse().ok(),
        timestamp: Some(caps["timestamp"].to_string()),
        hostname: Some(caps["hostname"].to_string()),
        app_name: nil_to_none(&caps["app_name"]),
        proc_id: nil_to_none(&caps["proc_id"]),
        msg_id: nil_to_none(&caps["msg_id"]),
        structured_data: nil_to_none(&caps["structured_data"]),
        message: caps["message"].trim().to_string(),
        format: SyslogFormat::Rfc5424,
    })
}

fn try_rfc3164(raw: &str) -> Result<ParsedFields, GrammarError> {
    let caps = RFC3164.captures(raw).ok_or(GrammarError::NoMatch)?;

    let priority: u32 = caps["priority"].parse().map_err(|_| GrammarError::NoMatch)?;
    let pri =
        u8::try_from(priority).map_err(|_| GrammarError::PriorityOutOfRange(priority))?;
    let (facility, facility_name, severity, severity_name) =
        decode_priority(pri).ok_or(GrammarError::PriorityOutOfRange(priority))?;

    Ok(ParsedFields {
        priority: pri,
        facility,
        facility_name,
        severity,
        severity_name,
        version: None,
        timestamp: Some(caps["timestamp"].to_string()),
        hostname: Some(caps["hostname"].to_string()),
        // BSD TAG/PID land in the app_name/proc_id slots of the common shape.
        app_name: caps.name("tag").map(|m| m.as_str().to_string()),
        proc_id: caps.name("pid").map(|m| m.as_str().to_string()),
        msg_id: None,
        structured_data: None,
        message: caps["message"].trim().to_string(),
        format: SyslogFormat::Rfc3164,
    })
}

/// Tries RFC 5424 then RFC 3164. The error reports why the stricter path was
/// rejected; callers that must not fail use [`parse`] instead.
pub fn try_parse(raw: &str) -> Result<ParsedFields, GrammarError> {
    match try_rfc5424(raw) {
        Ok(fields) => Ok(fields),
        Err(GrammarError::NoMatch) => try_rfc3164(raw),
        Err(e) => Err(e),
    }
}

fn fallback_fields(raw: &str) -> ParsedFields {
    // Priority 13 = user.notice, the RFC 3164 default.
    ParsedFields {
        priority: 13,
        facility: 1,
        facility_name: Facility::User,
        severity: 5,
        severity_name: Severity::Notice,
        version: None,
        timestamp: None,
        hostname: None,
        app_name: None,
        proc_id: None,
        msg_id: None,
        structured_data: None,
        message: raw.to_string(),
        format: SyslogFormat::Unknown,
    }
}

/// Parses a message and wraps it with transport metadata. Total: grammar
/// failure degrades to the fallback stub, and `received_at` is always
/// stamped.
pub fn parse(raw: &str, source_ip: &str, protocol: Protocol) -> RawRecord {
    let fields = match try_parse(raw) {
        Ok(fields) => fields,
        Err(e) => {
            let preview: String = raw.chars().take(100).collect();
            warn!(
                error = %e,
                source_ip,
                raw = %preview,
                "syslog parse failed, emitting fallback record"
            );
            fallback_fields(raw)
        },
    };

    RawRecord {
        source_ip: source_ip.to_string(),
        protocol,
        received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        raw: raw.to_string(),
        fields,
    }
}
