// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::cfg::enums::Stage;

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Parsed command line: `sentinel <stage> [config-path]`.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub stage: Stage,
    pub config_path: PathBuf,
}

impl CliArgs {
    pub fn from_env() -> Result<Self> {
        let mut args = std::env::args().skip(1);

        let Some(stage_arg) = args.next() else {
            bail!("usage: sentinel <receiver|processor|alerting> [config.yaml]");
        };
        let stage: Stage = stage_arg.parse().map_err(anyhow::Error::msg)?;

        let config_rel = args.next().unwrap_or_else(|| "config.yaml".to_string());
        let config_path = resolve_config_path(&config_rel)?;

        Ok(Self { stage, config_path })
    }
}
