// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Subcommand implementations.
//!
//! `dump` and `restore` share the same transfer shape: a remote task that
//! runs the generated command in the pod and a local task that moves bytes
//! between the pipe and the filesystem, applying the gzip filter the chosen
//! format calls for. This module holds the plumbing common to both
//! directions.

pub mod dump;
pub mod exec;
pub mod restore;
pub mod status;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Internal pipe capacity between the remote and local transfer tasks.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Where a dump lands locally, or where a restore reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// `-` means standard output, anything else is a path.
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            Destination::Stdout
        } else {
            Destination::File(PathBuf::from(raw))
        }
    }

    /// Open the destination for writing, creating parent directories for
    /// file targets. An existing file is truncated.
    pub fn create(&self) -> Result<Box<dyn Write + Send>> {
        match self {
            Destination::Stdout => Ok(Box::new(std::io::stdout())),
            Destination::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).with_context(|| {
                            format!("failed to create directory {}", parent.display())
                        })?;
                    }
                }
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                Ok(Box::new(file))
            }
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str("-"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Result of a completed transfer, logged and returned to the caller.
#[derive(Debug)]
pub struct TransferSummary {
    pub destination: String,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Default dump filename: `<namespace>-<database>-<YYYYMMDD-HHMMSS><ext>`.
pub fn generate_filename(
    namespace: &str,
    database: &str,
    extension: &str,
    now: DateTime<Local>,
) -> String {
    format!(
        "{namespace}-{database}-{}{extension}",
        now.format("%Y%m%d-%H%M%S")
    )
}

/// Await both halves of a transfer.
///
/// Both tasks are always driven to completion so neither side of the pipe is
/// dropped while the other is mid-write. The first task to settle with an
/// error is the one reported: when one half dies, the other usually fails
/// moments later with a consequential pipe-closure error that would mask the
/// root cause.
pub async fn join_transfer(
    mut remote: JoinHandle<Result<()>>,
    mut local: JoinHandle<Result<u64>>,
) -> Result<u64> {
    tokio::select! {
        res = &mut remote => {
            let first = flatten(res, "remote");
            let bytes = flatten(local.await, "local");
            first?;
            bytes
        }
        res = &mut local => {
            let first = flatten(res, "local");
            let second = flatten(remote.await, "remote");
            match first {
                Err(err) => Err(err),
                Ok(bytes) => {
                    second?;
                    Ok(bytes)
                }
            }
        }
    }
}

fn flatten<T>(
    joined: std::result::Result<Result<T>, tokio::task::JoinError>,
    task: &str,
) -> Result<T> {
    joined.with_context(|| format!("{task} transfer task panicked"))?
}

/// Ask a yes/no question on stderr and read the answer from stdin.
pub fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush().ok();
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}
