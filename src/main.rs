// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod actions;
mod cli;
mod command;
pub mod config;
mod dialect;
mod kubernetes;
pub mod progress;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::prelude::*;

use cli::{Cli, Command};
use config::{Defaults, Global};

/// Logs go to stderr only; stdout is reserved for dump data and query
/// output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "kubedump=debug"
    } else {
        "kubedump=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

/// Cancel in-flight transfers on the first interrupt; exit hard on the
/// second so a stuck stream cannot trap the user.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, cancelling");
        token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let defaults = Defaults::load().unwrap_or_else(|err| {
        warn!(error = %err, "ignoring unreadable config file");
        Defaults::default()
    });

    let token = CancellationToken::new();
    spawn_interrupt_handler(token.clone());

    // A status check may not authenticate at all, so a missing password
    // should not stop it.
    let needs_password = !matches!(cli.command, Command::Status);
    let global = Global::setup(&cli.global, &defaults, needs_password).await?;

    match &cli.command {
        Command::Dump(args) => {
            let summary = actions::dump::run(&global, args, token).await?;
            debug!(
                file = %summary.destination,
                bytes = summary.bytes,
                elapsed = ?summary.elapsed,
                "dump finished"
            );
        }
        Command::Restore(args) => {
            let summary = actions::restore::run(&global, args, token).await?;
            debug!(
                file = %summary.destination,
                bytes = summary.bytes,
                elapsed = ?summary.elapsed,
                "restore finished"
            );
        }
        Command::Exec(args) => actions::exec::run(&global, args, token).await?,
        Command::Status => actions::status::run(&global).await?,
    }
    Ok(())
}
