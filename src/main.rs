// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use syslog_sentinel_rs::{
    cfg::{cli::CliArgs, config::Config, enums::Stage, logger::init_logger},
    metrics::Metrics,
    service,
};
use tokio_util::sync::CancellationToken;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::from_env()?;

    let cfg = Config::load_from_file(&args.config_path)
        .context("failed to resolve or load config")?;
    let _log_guard = init_logger(&cfg.logger)?;

    let metrics = Metrics::new()?;
    let cancel = CancellationToken::new();
    service::spawn_signal_handler(cancel.clone());

    let res = match args.stage {
        Stage::Receiver => service::receiver::run(cfg, metrics, cancel.clone()).await,
        Stage::Processor => service::processor::run(cfg, metrics, cancel.clone()).await,
        Stage::Alerting => service::alerting::run(cfg, metrics, cancel.clone()).await,
    };

    if let Err(e) = &res {
        // Make sure sibling tasks (metrics server, workers) stop before the
        // non-zero exit.
        error!(stage = %args.stage, error = %e, "service fatal error");
        cancel.cancel();
    }

    res
}
