// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use magento_platformsh::{
    database::MySqlConnector, lifecycle::Lifecycle, settings::Settings, shell::SystemShell,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "magento-platformsh [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Settings file overriding deployment defaults.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log executed commands and their output.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("failed to load settings from {:?}", path.display()))?,
            None => Settings::default(),
        };
        debug!("settings:\n{settings}");

        let mut lifecycle = Lifecycle::new(settings, SystemShell::new(), MySqlConnector);
        let result = match self.command {
            Command::Build => lifecycle.build().context("build failed"),
            Command::Deploy => lifecycle.deploy().await.context("deploy failed"),
        };

        result.with_context(|| format!("stopped at stage: {}", lifecycle.stage()))
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Compile application and stage writable directories.
    #[command(override_usage = "magento-platformsh build [options]")]
    Build,

    /// Install or update application against current environment.
    #[command(override_usage = "magento-platformsh deploy [options]")]
    Deploy,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
