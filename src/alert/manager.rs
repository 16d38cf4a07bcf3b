// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{
    alert::{email::EmailChannel, webhook::WebhookChannel},
    cfg::config::AlertingConfig,
    metrics::Metrics,
    models::alert::AlertEvent,
};

/// One configured delivery sink.
#[derive(Clone)]
pub enum AlertChannel {
    Email(EmailChannel),
    Webhook(WebhookChannel),
}

impl AlertChannel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Webhook(_) => "webhook",
        }
    }

    pub async fn send(&self, alert: &AlertEvent) -> bool {
        match self {
            Self::Email(channel) => channel.send(alert).await,
            Self::Webhook(channel) => channel.send(alert).await,
        }
    }
}

/// Fans an alert out to every configured sink in parallel. Channels are
/// fixed at startup; per-channel failure is counted and contained.
pub struct ChannelManager {
    channels: Vec<AlertChannel>,
    metrics: Arc<Metrics>,
}

impl ChannelManager {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            channels: Vec::new(),
            metrics,
        }
    }

    /// Builds the sink list from configuration: email when recipients are
    /// set, webhook when a URL is set. A sink that fails to construct is
    /// skipped with a warning.
    pub fn from_config(cfg: &AlertingConfig, metrics: Arc<Metrics>) -> Self {
        let mut manager = Self::new(metrics);

        if let Some(smtp) = &cfg.smtp {
            if smtp.to_emails.is_empty() {
                warn!("smtp configured without recipients, email channel disabled");
            } else {
                match EmailChannel::new(smtp) {
                    Ok(channel) => {
                        info!(recipients = smtp.to_emails.len(), "email channel configured");
                        manager.add_channel(AlertChannel::Email(channel));
                    },
                    Err(e) => warn!(error = %e, "email channel disabled"),
                }
            }
        }

        if let Some(url) = &cfg.webhook_url {
            match WebhookChannel::new(url.clone()) {
                Ok(channel) => {
                    info!("webhook channel configured");
                    manager.add_channel(AlertChannel::Webhook(channel));
                },
                Err(e) => warn!(error = %e, "webhook channel disabled"),
            }
        }

        manager
    }

    pub fn add_channel(&mut self, channel: AlertChannel) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Dispatches to every channel concurrently and waits for all of them.
    /// Each call observes its own duration and outcome; a failing channel
    /// never affects its siblings.
    pub async fn send_alert(&self, alert: &AlertEvent) {
        if self.channels.is_empty() {
            warn!("no alert channels configured");
            return;
        }

        let mut tasks = JoinSet::new();
        for channel in &self.channels {
            let channel = channel.clone();
            let alert = alert.clone();
            let metrics = Arc::clone(&self.metrics);
            tasks.spawn(async move {
                let timer = metrics
                    .alert_delivery_duration_seconds
                    .with_label_values(&[channel.name()])
                    .start_timer();
                let ok = channel.send(&alert).await;
                timer.observe_duration();

                let status = if ok { "success" } else { "failed" };
                metrics
                    .alerts_sent_total
                    .with_label_values(&[channel.name(), status])
                    .inc();
                ok
            });
        }

        let mut successful = 0usize;
        while let Some(res) = tasks.join_next().await {
            if matches!(res, Ok(true)) {
                successful += 1;
            }
        }

        info!(
            rule_name = %alert.rule_name,
            total_channels = self.channels.len(),
            successful,
            "alert sent to channels"
        );
    }
}
