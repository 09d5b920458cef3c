// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for transfers.
//!
//! Byte-accurate accounting lives in [`CountingWriter`]/[`CountingReader`];
//! the indicatif bar is display only and is hidden when stderr is not a
//! terminal or quiet mode is on.

use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::time::Duration;

/// Create a byte progress bar. With an unknown total the bar runs in
/// spinner mode showing cumulative bytes and throughput.
pub fn transfer_bar(total: Option<u64>, quiet: bool, msg: &'static str) -> ProgressBar {
    if quiet || !Term::stderr().is_term() {
        return ProgressBar::hidden();
    }
    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{msg} [{bar:25.cyan/dim}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )
                    .expect("valid progress template")
                    .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .template("{spinner:.cyan} {msg} {bytes} ({bytes_per_sec}) {elapsed:.dim}")
                    .expect("valid progress template"),
            );
            bar
        }
    };
    bar.set_message(msg);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Writer that counts every byte it passes through and advances a bar.
pub struct CountingWriter<W> {
    inner: W,
    bar: ProgressBar,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W, bar: ProgressBar) -> Self {
        Self {
            inner,
            bar,
            bytes: 0,
        }
    }

    /// Exact number of bytes written so far.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes += written as u64;
        self.bar.inc(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Reader mirror of [`CountingWriter`], used on the restore path where
/// progress tracks bytes read from the source file.
pub struct CountingReader<R> {
    inner: R,
    bar: ProgressBar,
    bytes: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, bar: ProgressBar) -> Self {
        Self {
            inner,
            bar,
            bytes: 0,
        }
    }

    /// Exact number of bytes read so far. Deliberately not named `bytes`:
    /// with `std::io::Read` in scope that call would resolve to the by-value
    /// `Read::bytes` adapter instead.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.bytes += read as u64;
        self.bar.inc(read as u64);
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_writer_tracks_exact_bytes() {
        let mut writer = CountingWriter::new(Vec::new(), ProgressBar::hidden());
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(writer.total_bytes(), 11);
        assert_eq!(writer.into_inner(), b"hello world");
    }

    // `Read` is in scope here, so this also pins that the accessor does not
    // collide with the `Read::bytes` adapter.
    #[test]
    fn counting_reader_tracks_exact_bytes() {
        let mut reader = CountingReader::new(&b"some bytes"[..], ProgressBar::hidden());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.total_bytes(), 10);
        assert_eq!(out, b"some bytes");
    }

    #[test]
    fn hidden_bar_still_accumulates_position() {
        let bar = ProgressBar::hidden();
        let mut writer = CountingWriter::new(std::io::sink(), bar.clone());
        writer.write_all(&[0u8; 4096]).unwrap();
        assert_eq!(bar.position(), 4096);
    }
}
