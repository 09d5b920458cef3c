// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! PostgreSQL command construction (`pg_dump`, `pg_restore`, `psql`).

use crate::command::Command;

use super::{ConnectionOptions, DumpOptions, ExecOptions, Format, RestoreOptions};

/// The password travels as `PGPASSWORD` on the first stage rather than as a
/// flag, so it never shows up in the remote process list.
pub(super) fn dump(opts: &DumpOptions) -> Command {
    let mut cmd = Command::new("pg_dump");
    cmd.env_sensitive("PGPASSWORD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--dbname={}", opts.conn.database));
    for table in &opts.tables {
        cmd.arg(format!("--table={table}"));
    }
    for table in &opts.exclude_table {
        cmd.arg(format!("--exclude-table={table}"));
    }
    for table in &opts.exclude_table_data {
        cmd.arg(format!("--exclude-table-data={table}"));
    }
    if opts.format == Format::Custom {
        cmd.arg("--format=c");
    } else {
        // Drop/recreate statements can only be embedded in plain-text dumps.
        if opts.clean {
            cmd.arg("--clean");
            if opts.if_exists {
                cmd.arg("--if-exists");
            }
        }
        if opts.no_owner {
            cmd.arg("--no-owner");
        }
    }
    if !opts.quiet {
        cmd.arg("--verbose");
    }
    if opts.format != Format::Custom && opts.remote_gzip {
        cmd.pipe("gzip").arg("--force");
    }
    cmd
}

pub(super) fn restore(opts: &RestoreOptions) -> Command {
    if opts.format == Format::Custom {
        let mut cmd = Command::new("pg_restore");
        cmd.env_sensitive("PGPASSWORD", &opts.conn.password);
        push_connection(&mut cmd, &opts.conn);
        cmd.arg(format!("--dbname={}", opts.conn.database));
        cmd.arg("--format=custom");
        if opts.clean {
            cmd.arg("--clean");
            if opts.if_exists {
                cmd.arg("--if-exists");
            }
        }
        if opts.no_owner {
            cmd.arg("--no-owner");
        }
        if opts.halt_on_error {
            cmd.arg("--exit-on-error");
        }
        // --single-transaction is incompatible with parallel restore, so
        // --jobs is never emitted alongside it.
        if opts.single_transaction {
            cmd.arg("--single-transaction");
        }
        if !opts.quiet {
            cmd.arg("--verbose");
        }
        return cmd;
    }

    let mut cmd = if opts.remote_gzip || opts.format == Format::Gzip {
        let mut cmd = Command::new("gunzip");
        cmd.arg("--force").arg("--stdout");
        cmd.pipe("psql");
        cmd
    } else {
        Command::new("psql")
    };
    // The env binding must ride on the client stage; a pipeline prefix does
    // not export to later stages.
    cmd.env_sensitive("PGPASSWORD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--dbname={}", opts.conn.database));
    if opts.quiet {
        cmd.arg("--quiet").arg("--output=/dev/null");
    }
    if opts.halt_on_error {
        cmd.arg("--set=ON_ERROR_STOP=1");
    }
    if opts.single_transaction {
        cmd.arg("--single-transaction");
    }
    cmd
}

pub(super) fn exec(opts: &ExecOptions) -> Command {
    let mut cmd = Command::new("psql");
    cmd.env_sensitive("PGPASSWORD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--dbname={}", opts.conn.database));
    if opts.disable_headers {
        cmd.arg("--tuples-only").arg("--no-align");
    }
    if let Some(command) = &opts.command {
        cmd.arg(format!("--command={command}"));
    }
    cmd
}

pub(super) fn status(conn: &ConnectionOptions) -> Command {
    let mut cmd = Command::new("pg_isready");
    push_connection(&mut cmd, conn);
    cmd.arg(format!("--dbname={}", conn.database));
    cmd
}

fn push_connection(cmd: &mut Command, conn: &ConnectionOptions) {
    cmd.arg(format!("--host={}", conn.host));
    cmd.arg(format!("--username={}", conn.username));
}
