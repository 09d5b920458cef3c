// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Restore a local dump file into a database pod.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzEncoder;
use flate2::Compression;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tokio::io::DuplexStream;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{confirm, TransferSummary, PIPE_CAPACITY};
use crate::cli::RestoreArgs;
use crate::config::Global;
use crate::dialect::{ExecOptions, Format, RestoreOptions};
use crate::kubernetes::client::ExecStreams;
use crate::progress::{self, CountingReader};

pub async fn run(
    global: &Global,
    args: &RestoreArgs,
    token: CancellationToken,
) -> Result<TransferSummary> {
    let format = resolve_format(global, args)?;

    let metadata = std::fs::metadata(&args.filename)
        .with_context(|| format!("failed to read {}", args.filename.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a regular file", args.filename.display());
    }

    if !args.force {
        let prompt = format!(
            "Restore {} into database {} in namespace {}? Existing data may be overwritten.",
            args.filename.display(),
            global.conn.database,
            global.client.namespace
        );
        if !confirm(&prompt)? {
            bail!("restore aborted");
        }
    }

    let opts = RestoreOptions {
        conn: global.conn.clone(),
        format,
        clean: args.clean,
        if_exists: args.if_exists,
        no_owner: args.no_owner,
        single_transaction: args.single_transaction,
        halt_on_error: args.halt_on_error,
        quiet: global.quiet,
        remote_gzip: global.remote_gzip,
    };
    let command = global.dialect.restore_command(&opts)?;
    debug!(command = %command.redacted(), "built restore command");

    info!(
        pod = global.pod_name(),
        namespace = %global.client.namespace,
        database = %global.conn.database,
        file = %args.filename.display(),
        %format,
        "restoring database"
    );

    let bar = progress::transfer_bar(Some(metadata.len()), global.quiet, "uploading");
    let start = Instant::now();

    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    let client = global.client.clone();
    let pod = global.pod_name().to_string();
    let rendered = command.render();
    let remote = tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Err(anyhow!("restore cancelled")),
            res = client.exec(&pod, &rendered, ExecStreams::input(reader)) => res,
        }
    });

    let path = args.filename.clone();
    let remote_gzip = global.remote_gzip;
    let local_bar = bar.clone();
    let local = tokio::task::spawn_blocking(move || {
        read_local(&path, writer, format, remote_gzip, local_bar)
    });

    let result = super::join_transfer(remote, local).await;
    bar.finish_and_clear();
    let bytes = result.with_context(|| format!("restore of {} failed", args.filename.display()))?;

    if args.analyze {
        if let Some(query) = global.dialect.analyze_query() {
            analyze(global, query).await?;
        }
    }

    let elapsed = start.elapsed();
    info!(
        file = %args.filename.display(),
        bytes,
        elapsed = ?elapsed,
        "restore complete"
    );
    Ok(TransferSummary {
        destination: args.filename.display().to_string(),
        bytes,
        elapsed,
    })
}

/// Explicit flag wins; otherwise the filename extension decides. An
/// unrecognized extension is an error rather than a guess, since feeding a
/// binary dump into a text client destroys data.
fn resolve_format(global: &Global, args: &RestoreArgs) -> Result<Format> {
    if let Some(format) = args.format {
        return Ok(format);
    }
    let name = args.filename.to_string_lossy();
    global.dialect.format_from_filename(&name).ok_or_else(|| {
        anyhow!(
            "cannot infer dump format from {}; pass --format",
            args.filename.display()
        )
    })
}

/// Feed the dump file into the pipe, converting between the on-disk format
/// and the wire encoding. Gzip dumps go over the wire as-is; the remote
/// command always has a gunzip stage for them. Plain dumps are compressed
/// here when remote gzip is on.
fn read_local(
    path: &Path,
    writer: DuplexStream,
    format: Format,
    remote_gzip: bool,
    bar: ProgressBar,
) -> Result<u64> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = CountingReader::new(BufReader::new(file), bar);
    let mut sink = SyncIoBridge::new(writer);

    let bytes = match (format, remote_gzip) {
        (Format::Plain, true) => {
            let mut encoder = GzEncoder::new(reader, Compression::default());
            std::io::copy(&mut encoder, &mut sink)
                .context("failed to compress restore stream")?;
            encoder.get_ref().total_bytes()
        }
        _ => {
            let mut reader = reader;
            std::io::copy(&mut reader, &mut sink).context("failed to stream restore input")?;
            reader.total_bytes()
        }
    };

    // Close the pipe so the remote command sees EOF and commits.
    sink.shutdown().context("failed to close restore stream")?;
    Ok(bytes)
}

/// Refresh planner statistics after a successful restore.
async fn analyze(global: &Global, query: &str) -> Result<()> {
    let opts = ExecOptions {
        conn: global.conn.clone(),
        command: Some(query.to_string()),
        disable_headers: true,
    };
    let command = global.dialect.exec_command(&opts);
    debug!(command = %command.redacted(), "built analyze command");
    global
        .client
        .exec_capture(global.pod_name(), &command.render())
        .await
        .context("post-restore analyze failed")?;
    info!("refreshed planner statistics");
    Ok(())
}
