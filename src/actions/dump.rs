// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Dump a database out of a pod into a local file.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::ProgressBar;
use std::io::{Read, Write};
use std::time::Instant;
use tokio::io::DuplexStream;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{generate_filename, Destination, TransferSummary, PIPE_CAPACITY};
use crate::cli::DumpArgs;
use crate::config::Global;
use crate::dialect::{DumpOptions, Format};
use crate::kubernetes::client::ExecStreams;
use crate::progress::{self, CountingWriter};

pub async fn run(
    global: &Global,
    args: &DumpArgs,
    token: CancellationToken,
) -> Result<TransferSummary> {
    if let Some(dir) = &args.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let format = match (args.format, &args.filename) {
        (Some(format), _) => format,
        (None, Some(name)) if name != "-" => global
            .dialect
            .format_from_filename(name)
            .unwrap_or_default(),
        _ => Format::default(),
    };

    let destination = match &args.filename {
        Some(name) => Destination::parse(name),
        None => Destination::File(
            generate_filename(
                &global.client.namespace,
                &global.conn.database,
                global.dialect.dump_extension(format),
                Local::now(),
            )
            .into(),
        ),
    };

    let opts = DumpOptions {
        conn: global.conn.clone(),
        format,
        tables: args.tables.clone(),
        exclude_table: args.exclude_table.clone(),
        exclude_table_data: args.exclude_table_data.clone(),
        clean: args.clean,
        if_exists: args.if_exists,
        no_owner: args.no_owner,
        quiet: global.quiet,
        remote_gzip: global.remote_gzip,
    };
    let command = global.dialect.dump_command(&opts)?;
    debug!(command = %command.redacted(), "built dump command");

    info!(
        pod = global.pod_name(),
        namespace = %global.client.namespace,
        database = %global.conn.database,
        file = %destination,
        %format,
        "dumping database"
    );

    let sink = destination.create()?;
    let bar = progress::transfer_bar(None, global.quiet, "downloading");
    let start = Instant::now();

    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    let client = global.client.clone();
    let pod = global.pod_name().to_string();
    let rendered = command.render();
    let remote = tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Err(anyhow!("dump cancelled")),
            res = client.exec(&pod, &rendered, ExecStreams::output(writer)) => res,
        }
    });

    let remote_gzip = global.remote_gzip;
    let local_bar = bar.clone();
    let local = tokio::task::spawn_blocking(move || {
        write_local(reader, sink, format, remote_gzip, local_bar)
    });

    let result = super::join_transfer(remote, local).await;
    bar.finish_and_clear();
    // On failure the partial file is left in place for inspection.
    let bytes = result.with_context(|| format!("dump to {destination} failed"))?;

    let elapsed = start.elapsed();
    info!(
        file = %destination,
        bytes,
        elapsed = ?elapsed,
        "dump complete"
    );
    Ok(TransferSummary {
        destination: destination.to_string(),
        bytes,
        elapsed,
    })
}

/// Drain the pipe into the local sink, converting between the wire encoding
/// and the on-disk format.
///
/// With remote gzip on, plain-format output arrives compressed and is
/// inflated here; with remote gzip off, gzip-format output arrives raw and
/// is compressed here. Everything else passes through untouched.
fn write_local(
    reader: DuplexStream,
    sink: Box<dyn Write + Send>,
    format: Format,
    remote_gzip: bool,
    bar: ProgressBar,
) -> Result<u64> {
    let reader = SyncIoBridge::new(reader);
    let mut out = CountingWriter::new(sink, bar);
    copy_filtered(reader, &mut out, format, remote_gzip)?;
    out.flush().context("failed to flush dump output")?;
    Ok(out.total_bytes())
}

fn copy_filtered<R: Read, W: Write>(
    mut reader: R,
    out: &mut W,
    format: Format,
    remote_gzip: bool,
) -> Result<()> {
    match (format, remote_gzip) {
        (Format::Plain, true) => {
            let mut decoder = GzDecoder::new(reader);
            std::io::copy(&mut decoder, out).context("failed to decompress dump stream")?;
        }
        (Format::Gzip, false) => {
            let mut encoder = GzEncoder::new(out, Compression::default());
            std::io::copy(&mut reader, &mut encoder).context("failed to compress dump stream")?;
            encoder.finish().context("failed to finish gzip stream")?;
        }
        _ => {
            std::io::copy(&mut reader, out).context("failed to write dump stream")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use flate2::read::GzEncoder as ReadGzEncoder;

    use super::*;

    const PAYLOAD: &[u8] = b"CREATE TABLE users (id int);\nINSERT INTO users VALUES (1);\n";

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ReadGzEncoder::new(data, Compression::default())
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn plain_format_with_remote_gzip_is_inflated_locally() {
        let mut out = Vec::new();
        copy_filtered(&gzipped(PAYLOAD)[..], &mut out, Format::Plain, true).unwrap();
        assert_eq!(out, PAYLOAD);
    }

    #[test]
    fn gzip_format_without_remote_gzip_is_compressed_locally() {
        let mut out = Vec::new();
        copy_filtered(PAYLOAD, &mut out, Format::Gzip, false).unwrap();
        let mut inflated = Vec::new();
        GzDecoder::new(&out[..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, PAYLOAD);
    }

    #[test]
    fn gzip_format_with_remote_gzip_passes_through() {
        let wire = gzipped(PAYLOAD);
        let mut out = Vec::new();
        copy_filtered(&wire[..], &mut out, Format::Gzip, true).unwrap();
        assert_eq!(out, wire);
    }

    #[test]
    fn custom_format_is_never_filtered() {
        let mut out = Vec::new();
        copy_filtered(PAYLOAD, &mut out, Format::Custom, true).unwrap();
        assert_eq!(out, PAYLOAD);
    }

    #[test]
    fn byte_count_reflects_the_on_disk_size() {
        let wire = gzipped(PAYLOAD);
        let bar = ProgressBar::hidden();
        let mut out = CountingWriter::new(Vec::new(), bar);
        copy_filtered(&wire[..], &mut out, Format::Plain, true).unwrap();
        assert_eq!(out.total_bytes(), PAYLOAD.len() as u64);
    }
}
