// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use tracing::{error, info};

use crate::{cfg::config::SmtpConfig, models::alert::AlertEvent};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP sink: STARTTLS relay, multipart alternative (plain + HTML) body.
#[derive(Clone)]
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailChannel {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("failed to build smtp transport")?
            .port(cfg.port)
            .timeout(Some(SMTP_TIMEOUT));
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }

        let from: Mailbox = cfg
            .from_email
            .parse()
            .with_context(|| format!("invalid from_email {:?}", cfg.from_email))?;
        let to = cfg
            .to_emails
            .iter()
            .map(|addr| {
                addr.parse()
                    .with_context(|| format!("invalid recipient {addr:?}"))
            })
            .collect::<Result<Vec<Mailbox>>>()?;

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub async fn send(&self, alert: &AlertEvent) -> bool {
        let subject = format!(
            "[{}] {}",
            alert.severity.as_str().to_uppercase(),
            alert.rule_name
        );

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }

        let message = match builder.multipart(MultiPart::alternative_plain_html(
            plain_body(alert),
            html_body(alert),
        )) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, rule_name = %alert.rule_name, "email build failed");
                return false;
            },
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(rule_name = %alert.rule_name, "email alert sent");
                true
            },
            Err(e) => {
                error!(error = %e, rule_name = %alert.rule_name, "email alert failed");
                false
            },
        }
    }
}

fn plain_body(alert: &AlertEvent) -> String {
    let log = &alert.log_data;
    let threat_keywords = if log.threat_keywords.is_empty() {
        "None".to_string()
    } else {
        log.threat_keywords.join(", ")
    };

    format!(
        "Sentinel Alert\n\
         \n\
         Severity: {}\n\
         Rule: {}\n\
         Description: {}\n\
         Timestamp: {}\n\
         \n\
         Log Details:\n\
         - Hostname: {}\n\
         - Source IP: {}\n\
         - Facility: {}\n\
         - Severity: {}\n\
         - Message: {}\n\
         \n\
         Threat Score: {}\n\
         Threat Indicators: {}\n",
        alert.severity.as_str().to_uppercase(),
        alert.rule_name,
        alert.description,
        alert.timestamp,
        log.hostname().unwrap_or("N/A"),
        log.base.source_ip,
        log.base.fields.facility_name,
        log.base.fields.severity_name,
        log.message(),
        log.threat_score,
        threat_keywords,
    )
}

fn html_body(alert: &AlertEvent) -> String {
    let log = &alert.log_data;
    let row = |label: &str, value: &str| {
        format!(
            "<tr><td style=\"padding: 8px; border: 1px solid #ddd;\"><strong>{label}:</strong></td>\
             <td style=\"padding: 8px; border: 1px solid #ddd;\">{value}</td></tr>"
        )
    };

    format!(
        "<html>\n  <body style=\"font-family: Arial, sans-serif;\">\n    \
         <div style=\"background-color: #f44336; color: white; padding: 20px; border-radius: 5px;\">\n      \
         <h2>Sentinel Alert</h2>\n      \
         <p><strong>Severity:</strong> {}</p>\n    </div>\n    \
         <div style=\"padding: 20px; background-color: #f5f5f5; margin-top: 20px; border-radius: 5px;\">\n      \
         <h3>{}</h3>\n      <p>{}</p>\n      \
         <p><strong>Timestamp:</strong> {}</p>\n    </div>\n    \
         <div style=\"padding: 20px; margin-top: 20px;\">\n      <h3>Log Details</h3>\n      \
         <table style=\"width: 100%; border-collapse: collapse;\">\n        {}{}{}{}{}{}\n      </table>\n    </div>\n  </body>\n</html>",
        alert.severity.as_str().to_uppercase(),
        alert.rule_name,
        alert.description,
        alert.timestamp,
        row("Hostname", log.hostname().unwrap_or("N/A")),
        row("Source IP", &log.base.source_ip),
        row("Facility", log.base.fields.facility_name.as_str()),
        row("Severity", log.base.fields.severity_name.as_str()),
        row("Message", log.message()),
        row("Threat Score", &log.threat_score.to_string()),
    )
}
