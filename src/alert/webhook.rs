// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use crate::models::{alert::AlertEvent, priority::SeverityCategory};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
/// Chat payloads carry a preview, not the whole log line.
const MESSAGE_PREVIEW_CHARS: usize = 200;

/// Chat-webhook sink: one JSON POST per alert.
#[derive(Clone)]
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

fn severity_color(severity: SeverityCategory) -> &'static str {
    match severity {
        SeverityCategory::Critical => "#ff0000",
        SeverityCategory::High => "#ff6600",
        SeverityCategory::Medium => "#ffcc00",
        SeverityCategory::Low => "#00cc00",
    }
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("failed to build webhook http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn send(&self, alert: &AlertEvent) -> bool {
        let log = &alert.log_data;
        let preview: String = log.message().chars().take(MESSAGE_PREVIEW_CHARS).collect();

        let payload = json!({
            "text": format!(":rotating_light: *Sentinel Alert* - {}", alert.rule_name),
            "attachments": [{
                "color": severity_color(alert.severity),
                "fields": [
                    {
                        "title": "Severity",
                        "value": alert.severity.as_str().to_uppercase(),
                        "short": true,
                    },
                    { "title": "Rule", "value": &alert.rule_name, "short": true },
                    {
                        "title": "Description",
                        "value": &alert.description,
                        "short": false,
                    },
                    {
                        "title": "Hostname",
                        "value": log.hostname().unwrap_or("N/A"),
                        "short": true,
                    },
                    {
                        "title": "Source IP",
                        "value": &log.base.source_ip,
                        "short": true,
                    },
                    { "title": "Message", "value": preview, "short": false },
                    {
                        "title": "Threat Score",
                        "value": log.threat_score.to_string(),
                        "short": true,
                    },
                ],
                "footer": "Sentinel",
                "ts": Utc::now().timestamp(),
            }],
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(rule_name = %alert.rule_name, "webhook alert sent");
                true
            },
            Ok(resp) => {
                error!(
                    status = %resp.status(),
                    rule_name = %alert.rule_name,
                    "webhook alert rejected"
                );
                false
            },
            Err(e) => {
                error!(error = %e, rule_name = %alert.rule_name, "webhook alert failed");
                false
            },
        }
    }
}
