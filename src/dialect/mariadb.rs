// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! MariaDB/MySQL command construction.
//!
//! Client binaries are resolved remotely through a raw shell fragment, since
//! images ship either the `mariadb-*` or the legacy `mysql*` names.

use crate::command::Command;

use super::{ConnectionOptions, DumpOptions, ExecOptions, RestoreOptions};

const DUMP_BIN: &str = r#""$(which mariadb-dump || which mysqldump)""#;
const CLIENT_BIN: &str = r#""$(which mariadb || which mysql)""#;
const ADMIN_BIN: &str = r#""$(which mariadb-admin || which mysqladmin)""#;

pub(super) fn dump(opts: &DumpOptions) -> Command {
    let mut cmd = Command::raw(DUMP_BIN);
    cmd.env_sensitive("MYSQL_PWD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    // mysqldump has no data-only exclusion, so both exclude lists skip the
    // table entirely.
    for table in opts.exclude_table.iter().chain(&opts.exclude_table_data) {
        cmd.arg(format!("--ignore-table={}.{table}", opts.conn.database));
    }
    cmd.arg(&opts.conn.database);
    for table in &opts.tables {
        cmd.arg(table);
    }
    if !opts.quiet {
        cmd.arg("--verbose");
    }
    if opts.remote_gzip {
        cmd.pipe("gzip").arg("--force");
    }
    cmd
}

pub(super) fn restore(opts: &RestoreOptions) -> Command {
    let mut cmd = if opts.remote_gzip || opts.format == super::Format::Gzip {
        let mut cmd = Command::new("gunzip");
        cmd.arg("--force").arg("--stdout");
        cmd.pipe_raw(CLIENT_BIN);
        cmd
    } else {
        Command::raw(CLIENT_BIN)
    };
    // The env binding must ride on the client stage; a pipeline prefix does
    // not export to later stages.
    cmd.env_sensitive("MYSQL_PWD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    if !opts.halt_on_error {
        cmd.arg("--force");
    }
    cmd.arg(&opts.conn.database);
    cmd
}

pub(super) fn exec(opts: &ExecOptions) -> Command {
    let mut cmd = Command::raw(CLIENT_BIN);
    cmd.env_sensitive("MYSQL_PWD", &opts.conn.password);
    push_connection(&mut cmd, &opts.conn);
    cmd.arg(format!("--database={}", opts.conn.database));
    if opts.disable_headers {
        cmd.arg("--skip-column-names");
    }
    if let Some(command) = &opts.command {
        cmd.arg(format!("--execute={command}"));
    }
    cmd
}

pub(super) fn status(conn: &ConnectionOptions) -> Command {
    let mut cmd = Command::raw(ADMIN_BIN);
    cmd.env_sensitive("MYSQL_PWD", &conn.password);
    push_connection(&mut cmd, conn);
    cmd.arg("ping");
    cmd
}

fn push_connection(cmd: &mut Command, conn: &ConnectionOptions) {
    cmd.arg(format!("--host={}", conn.host));
    cmd.arg(format!("--user={}", conn.username));
}

#[cfg(test)]
mod tests {
    use crate::dialect::{Dialect, Format};

    use super::*;

    fn conn() -> ConnectionOptions {
        ConnectionOptions {
            host: "1.1.1.1".into(),
            port: 3306,
            username: "u".into(),
            password: "pw".into(),
            database: "d".into(),
        }
    }

    #[test]
    fn dump_resolves_binary_remotely() {
        let opts = DumpOptions {
            conn: conn(),
            format: Format::Gzip,
            remote_gzip: true,
            ..DumpOptions::default()
        };
        let cmd = Dialect::Mariadb.dump_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            r#"MYSQL_PWD='pw' "$(which mariadb-dump || which mysqldump)" --host=1.1.1.1 --user=u d --verbose | gzip --force"#
        );
    }

    #[test]
    fn dump_excludes_map_to_ignore_table() {
        let opts = DumpOptions {
            conn: conn(),
            format: Format::Plain,
            tables: vec!["users".into()],
            exclude_table: vec!["audit".into()],
            exclude_table_data: vec!["sessions".into()],
            quiet: true,
            remote_gzip: false,
            ..DumpOptions::default()
        };
        let cmd = Dialect::Mariadb.dump_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            r#"MYSQL_PWD='pw' "$(which mariadb-dump || which mysqldump)" --host=1.1.1.1 --user=u --ignore-table=d.audit --ignore-table=d.sessions d users"#
        );
    }

    #[test]
    fn restore_gzip_pipes_through_gunzip() {
        let opts = RestoreOptions {
            conn: conn(),
            format: Format::Gzip,
            halt_on_error: true,
            remote_gzip: true,
            ..RestoreOptions::default()
        };
        let cmd = Dialect::Mariadb.restore_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            r#"gunzip --force --stdout | MYSQL_PWD='pw' "$(which mariadb || which mysql)" --host=1.1.1.1 --user=u d"#
        );
    }

    #[test]
    fn restore_continues_on_error_by_default() {
        let opts = RestoreOptions {
            conn: conn(),
            format: Format::Plain,
            remote_gzip: false,
            ..RestoreOptions::default()
        };
        let cmd = Dialect::Mariadb.restore_command(&opts).unwrap();
        assert_eq!(
            cmd.render(),
            r#"MYSQL_PWD='pw' "$(which mariadb || which mysql)" --host=1.1.1.1 --user=u --force d"#
        );
    }

    #[test]
    fn exec_list_tables_is_headerless() {
        let opts = ExecOptions {
            conn: conn(),
            command: Some(Dialect::Mariadb.list_tables_query().to_string()),
            disable_headers: true,
        };
        let cmd = Dialect::Mariadb.exec_command(&opts);
        assert_eq!(
            cmd.render(),
            r#"MYSQL_PWD='pw' "$(which mariadb || which mysql)" --host=1.1.1.1 --user=u --database=d --skip-column-names '--execute=SHOW TABLES'"#
        );
    }

    #[test]
    fn status_pings_the_server() {
        let cmd = Dialect::Mariadb.status_command(&conn());
        assert_eq!(
            cmd.render(),
            r#"MYSQL_PWD='pw' "$(which mariadb-admin || which mysqladmin)" --host=1.1.1.1 --user=u ping"#
        );
    }
}
