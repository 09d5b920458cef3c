// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! MongoDB command construction (`mongodump`, `mongorestore`, `mongosh`).
//!
//! Mongo tools take the password as a flag, so the value is marked sensitive
//! and redacted in any logged rendering.

use crate::command::Command;

use super::{ConnectionOptions, DumpOptions, ExecOptions, Format, RestoreOptions};

pub(super) fn dump(opts: &DumpOptions) -> Command {
    let mut cmd = Command::new("mongodump");
    cmd.arg("--archive");
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--db={}", opts.conn.database));
    if opts.quiet {
        cmd.arg("--quiet");
    }
    if opts.format == Format::Gzip && opts.remote_gzip {
        cmd.pipe("gzip").arg("--force");
    }
    cmd
}

pub(super) fn restore(opts: &RestoreOptions) -> Command {
    // Native archives are never gzipped on the wire.
    let mut cmd = if opts.format == Format::Gzip {
        let mut cmd = Command::new("gunzip");
        cmd.arg("--force").arg("--stdout");
        cmd.pipe("mongorestore");
        cmd
    } else {
        Command::new("mongorestore")
    };
    cmd.arg("--archive");
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--db={}", opts.conn.database));
    if opts.clean {
        cmd.arg("--drop");
    }
    if opts.quiet {
        cmd.arg("--quiet");
    }
    cmd
}

pub(super) fn exec(opts: &ExecOptions) -> Command {
    let mut cmd = Command::new("mongosh");
    push_connection(&mut cmd, &opts.conn);
    if opts.disable_headers {
        cmd.arg("--quiet");
    }
    if let Some(command) = &opts.command {
        cmd.arg(format!("--eval={command}"));
    }
    cmd.arg(&opts.conn.database);
    cmd
}

pub(super) fn status(conn: &ConnectionOptions) -> Command {
    let mut cmd = Command::new("mongosh");
    push_connection(&mut cmd, conn);
    cmd.arg("--quiet");
    cmd.arg("--eval=db.runCommand({ping: 1}).ok");
    cmd.arg(&conn.database);
    cmd
}

fn push_connection(cmd: &mut Command, conn: &ConnectionOptions) {
    cmd.arg(format!("--host={}", conn.host));
    cmd.arg(format!("--username={}", conn.username));
    cmd.arg("--password");
    cmd.arg_sensitive(&conn.password);
    cmd.arg("--authenticationDatabase=admin");
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;

    use super::*;

    fn conn() -> ConnectionOptions {
        ConnectionOptions {
            host: "1.1.1.1".into(),
            port: 27017,
            username: "u".into(),
            password: "pw".into(),
            database: "d".into(),
        }
    }

    #[test]
    fn dump_gzip_appends_compression_stage() {
        let opts = DumpOptions {
            conn: conn(),
            format: Format::Gzip,
            remote_gzip: true,
            ..DumpOptions::default()
        };
        let cmd = Dialect::Mongodb.dump_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            "mongodump --archive --host=1.1.1.1 --username=u --password pw \
             --authenticationDatabase=admin --db=d | gzip --force"
        );
    }

    #[test]
    fn dump_native_archive_is_not_compressed() {
        let opts = DumpOptions {
            conn: conn(),
            format: Format::Custom,
            remote_gzip: true,
            ..DumpOptions::default()
        };
        let cmd = Dialect::Mongodb.dump_command(&opts).unwrap();
        assert!(!cmd.render().contains(" | "));
    }

    #[test]
    fn dump_password_is_redacted_in_logs() {
        let opts = DumpOptions {
            conn: conn(),
            format: Format::Custom,
            ..DumpOptions::default()
        };
        let cmd = Dialect::Mongodb.dump_command(&opts).unwrap();
        assert!(!cmd.redacted().contains("pw"));
        assert!(cmd.render().contains("--password pw"));
    }

    #[test]
    fn restore_drops_collections_when_clean() {
        let opts = RestoreOptions {
            conn: conn(),
            format: Format::Gzip,
            clean: true,
            quiet: true,
            remote_gzip: true,
            ..RestoreOptions::default()
        };
        let cmd = Dialect::Mongodb.restore_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            "gunzip --force --stdout | mongorestore --archive --host=1.1.1.1 --username=u \
             --password pw --authenticationDatabase=admin --db=d --drop --quiet"
        );
    }

    #[test]
    fn exec_evaluates_introspection_scripts() {
        let opts = ExecOptions {
            conn: conn(),
            command: Some(Dialect::Mongodb.list_tables_query().to_string()),
            disable_headers: true,
        };
        let cmd = Dialect::Mongodb.exec_command(&opts);
        let rendered = cmd.render();
        assert!(rendered.starts_with("mongosh --host=1.1.1.1"));
        assert!(rendered.contains("--quiet"));
        assert!(rendered.contains("getCollectionNames"));
        assert!(rendered.ends_with(" d"));
    }
}
