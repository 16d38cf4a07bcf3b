// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Index rollover cadence for the document store.
///
/// The suffix joins the index prefix as `<prefix>-<suffix>`, so retention is
/// an operation over whole indices.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRotation {
    #[serde(rename = "daily", alias = "Daily", alias = "DAILY")]
    Daily,
    #[serde(rename = "weekly", alias = "Weekly", alias = "WEEKLY")]
    Weekly,
    #[serde(rename = "monthly", alias = "Monthly", alias = "MONTHLY")]
    Monthly,
}

impl IndexRotation {
    /// Renders the rollover suffix for a calendar date.
    pub fn suffix(&self, date: NaiveDate) -> String {
        match self {
            Self::Daily => date.format("%Y.%m.%d").to_string(),
            Self::Weekly => date.format("%Y.%W").to_string(),
            Self::Monthly => date.format("%Y.%m").to_string(),
        }
    }
}

impl fmt::Display for IndexRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        })
    }
}

/// Pipeline stage selected on the command line. Each stage is a long-running
/// process with the shared start/drain/stop lifecycle.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Receiver,
    Processor,
    Alerting,
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "receiver" => Ok(Self::Receiver),
            "processor" => Ok(Self::Processor),
            "alerting" => Ok(Self::Alerting),
            other => Err(format!(
                "unknown stage {other:?}, expected receiver|processor|alerting"
            )),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Receiver => "receiver",
            Self::Processor => "processor",
            Self::Alerting => "alerting",
        })
    }
}
