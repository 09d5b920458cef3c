// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Interactive database shell, or one-shot statement execution.

use anyhow::{anyhow, Context, Result};
use kube::api::TerminalSize;
use std::io::IsTerminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::ExecArgs;
use crate::config::Global;
use crate::dialect::ExecOptions;
use crate::kubernetes::client::ExecStreams;

pub async fn run(global: &Global, args: &ExecArgs, token: CancellationToken) -> Result<()> {
    let opts = ExecOptions {
        conn: global.conn.clone(),
        command: args.command.clone(),
        disable_headers: false,
    };
    let command = global.dialect.exec_command(&opts);
    debug!(command = %command.redacted(), "built exec command");
    let rendered = command.render();

    if args.command.is_some() {
        let output = tokio::select! {
            _ = token.cancelled() => return Err(anyhow!("statement cancelled")),
            res = global
                .client
                .exec_capture(global.pod_name(), &rendered) => res?,
        };
        print!("{output}");
        return Ok(());
    }

    // Interactive session. Only allocate a remote TTY when both local ends
    // are terminals, so piped input still works.
    let tty = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    let resize = if tty { Some(resize_watcher()) } else { None };
    let _raw = if tty {
        Some(RawModeGuard::enable()?)
    } else {
        None
    };

    let streams = ExecStreams::interactive(tokio::io::stdin(), tokio::io::stdout(), tty, resize);
    tokio::select! {
        _ = token.cancelled() => Err(anyhow!("session cancelled")),
        res = global
            .client
            .exec(global.pod_name(), &rendered, streams) => res,
    }
}

/// Puts the local terminal into raw mode for the lifetime of the session so
/// keystrokes reach the remote shell unprocessed.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        crossterm::terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        crossterm::terminal::disable_raw_mode().ok();
    }
}

/// Send the current terminal size immediately, then again on every
/// SIGWINCH, so the remote TTY tracks local window resizes.
fn resize_watcher() -> mpsc::Receiver<TerminalSize> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        if let Some(size) = current_size() {
            if tx.send(size).await.is_err() {
                return;
            }
        }
        let Ok(mut winch) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())
        else {
            return;
        };
        while winch.recv().await.is_some() {
            match current_size() {
                Some(size) => {
                    if tx.send(size).await.is_err() {
                        break;
                    }
                }
                None => continue,
            }
        }
    });
    rx
}

fn current_size() -> Option<TerminalSize> {
    crossterm::terminal::size()
        .ok()
        .map(|(width, height)| TerminalSize { width, height })
}
