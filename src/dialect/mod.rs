// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Database dialects.
//!
//! A [`Dialect`] is a closed set of supported engines behind one capability
//! surface: it builds dump/restore/exec commands for its engine and exposes
//! the metadata used for pod targeting and connection autodetection. Adding
//! an engine means adding a variant here plus its module; the pod selector
//! and the transfer orchestrator are untouched.

mod mariadb;
mod mongodb;
mod postgres;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::fmt;

use crate::command::Command;
use crate::kubernetes::selector::LabelQuery;

/// Output representation of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Plain dump compressed with gzip (`.sql.gz` / `.archive.gz`).
    #[default]
    Gzip,
    /// Engine-native binary format (`pg_dump --format=c`, mongo archive).
    Custom,
    /// Uncompressed plain text.
    Plain,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Gzip => "gzip",
            Format::Custom => "custom",
            Format::Plain => "plain",
        };
        f.write_str(name)
    }
}

/// Connection parameters shared by every generated command.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub conn: ConnectionOptions,
    pub format: Format,
    pub tables: Vec<String>,
    pub exclude_table: Vec<String>,
    pub exclude_table_data: Vec<String>,
    pub clean: bool,
    pub if_exists: bool,
    pub no_owner: bool,
    pub quiet: bool,
    pub remote_gzip: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub conn: ConnectionOptions,
    pub format: Format,
    pub clean: bool,
    pub if_exists: bool,
    pub no_owner: bool,
    pub single_transaction: bool,
    pub halt_on_error: bool,
    pub quiet: bool,
    pub remote_gzip: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub conn: ConnectionOptions,
    /// Statement to run. `None` opens an interactive shell.
    pub command: Option<String>,
    /// Strip headers/footers so output is one bare name per line.
    pub disable_headers: bool,
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dialect {
    Postgres,
    Mariadb,
    Mongodb,
}

impl Dialect {
    /// Detection order for dialect autodetection.
    pub const ALL: [Dialect; 3] = [Dialect::Postgres, Dialect::Mariadb, Dialect::Mongodb];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mariadb => "mariadb",
            Dialect::Mongodb => "mongodb",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => &["postgresql", "psql", "pg"],
            Dialect::Mariadb => &["maria", "mysql"],
            Dialect::Mongodb => &["mongo"],
        }
    }

    /// Resolve a dialect by canonical name or alias (config file values).
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.name() == lower || d.aliases().contains(&lower.as_str()))
            .ok_or_else(|| anyhow!("unknown dialect: {name}"))
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::Mariadb => 3306,
            Dialect::Mongodb => 27017,
        }
    }

    pub fn default_user(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mariadb => "root",
            Dialect::Mongodb => "root",
        }
    }

    pub fn default_database(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mariadb => "mysql",
            Dialect::Mongodb => "admin",
        }
    }

    /// Candidate pod environment variables holding the database name,
    /// ordered; first match wins.
    pub fn database_env_names(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => &["POSTGRES_DB", "PGDATABASE"],
            Dialect::Mariadb => &["MARIADB_DATABASE", "MYSQL_DATABASE"],
            Dialect::Mongodb => &["MONGO_INITDB_DATABASE"],
        }
    }

    pub fn user_env_names(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => &["POSTGRES_USER", "PGUSER"],
            Dialect::Mariadb => &["MARIADB_USER", "MYSQL_USER"],
            Dialect::Mongodb => &["MONGO_INITDB_ROOT_USERNAME"],
        }
    }

    pub fn password_env_names(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => &["POSTGRES_PASSWORD", "PGPASSWORD"],
            Dialect::Mariadb => &[
                "MARIADB_PASSWORD",
                "MYSQL_PASSWORD",
                "MARIADB_ROOT_PASSWORD",
                "MYSQL_ROOT_PASSWORD",
            ],
            Dialect::Mongodb => &["MONGO_INITDB_ROOT_PASSWORD"],
        }
    }

    /// Label queries used to find this engine's pod, in priority order.
    pub fn pod_labels(&self) -> Vec<LabelQuery> {
        let pairs: &[(&str, &str)] = match self {
            Dialect::Postgres => &[
                ("app.kubernetes.io/name", "postgresql"),
                ("app", "postgresql"),
                ("app.kubernetes.io/name", "postgres"),
            ],
            Dialect::Mariadb => &[
                ("app.kubernetes.io/name", "mariadb"),
                ("app", "mariadb"),
                ("app.kubernetes.io/name", "mysql"),
                ("app", "mysql"),
            ],
            Dialect::Mongodb => &[("app.kubernetes.io/name", "mongodb"), ("app", "mongodb")],
        };
        pairs
            .iter()
            .map(|(name, value)| LabelQuery::new(*name, *value))
            .collect()
    }

    /// Output formats this engine supports.
    pub fn formats(&self) -> &'static [Format] {
        match self {
            Dialect::Postgres => &[Format::Gzip, Format::Custom, Format::Plain],
            Dialect::Mariadb => &[Format::Gzip, Format::Plain],
            Dialect::Mongodb => &[Format::Gzip, Format::Custom],
        }
    }

    /// File extension for a dump in the given format.
    pub fn dump_extension(&self, format: Format) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Mariadb => match format {
                Format::Gzip => ".sql.gz",
                Format::Custom => ".dmp",
                Format::Plain => ".sql",
            },
            Dialect::Mongodb => match format {
                Format::Gzip => ".archive.gz",
                Format::Custom | Format::Plain => ".archive",
            },
        }
    }

    /// Infer the dump format from a filename extension.
    pub fn format_from_filename(&self, filename: &str) -> Option<Format> {
        for format in self.formats() {
            if filename.ends_with(self.dump_extension(*format)) {
                return Some(*format);
            }
        }
        None
    }

    pub fn dump_command(&self, opts: &DumpOptions) -> Result<Command> {
        self.check_format(opts.format)?;
        Ok(match self {
            Dialect::Postgres => postgres::dump(opts),
            Dialect::Mariadb => mariadb::dump(opts),
            Dialect::Mongodb => mongodb::dump(opts),
        })
    }

    pub fn restore_command(&self, opts: &RestoreOptions) -> Result<Command> {
        self.check_format(opts.format)?;
        Ok(match self {
            Dialect::Postgres => postgres::restore(opts),
            Dialect::Mariadb => mariadb::restore(opts),
            Dialect::Mongodb => mongodb::restore(opts),
        })
    }

    pub fn exec_command(&self, opts: &ExecOptions) -> Command {
        match self {
            Dialect::Postgres => postgres::exec(opts),
            Dialect::Mariadb => mariadb::exec(opts),
            Dialect::Mongodb => mongodb::exec(opts),
        }
    }

    /// Readiness check run by the `status` subcommand.
    pub fn status_command(&self, conn: &ConnectionOptions) -> Command {
        match self {
            Dialect::Postgres => postgres::status(conn),
            Dialect::Mariadb => mariadb::status(conn),
            Dialect::Mongodb => mongodb::status(conn),
        }
    }

    /// Introspection statement listing table names, one per line, no headers.
    pub fn list_tables_query(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SELECT tablename FROM pg_tables WHERE schemaname='public'",
            Dialect::Mariadb => "SHOW TABLES",
            Dialect::Mongodb => r#"db.getCollectionNames().join("\n")"#,
        }
    }

    /// Introspection statement listing database names, one per line.
    pub fn list_databases_query(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SELECT datname FROM pg_database WHERE datistemplate = false",
            Dialect::Mariadb => "SHOW DATABASES",
            Dialect::Mongodb => r#"db.getMongo().getDBNames().join("\n")"#,
        }
    }

    /// Statement run after a successful restore to refresh planner
    /// statistics, if the engine has one.
    pub fn analyze_query(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => Some("ANALYZE;"),
            Dialect::Mariadb | Dialect::Mongodb => None,
        }
    }

    fn check_format(&self, format: Format) -> Result<()> {
        if self.formats().contains(&format) {
            Ok(())
        } else {
            Err(anyhow!(
                "dialect {} does not support the {format} format",
                self.name()
            ))
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_resolves_aliases() {
        assert_eq!(Dialect::from_name("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_name("psql").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_name("MySQL").unwrap(), Dialect::Mariadb);
        assert_eq!(Dialect::from_name("mongo").unwrap(), Dialect::Mongodb);
        assert!(Dialect::from_name("oracle").is_err());
    }

    #[test]
    fn format_from_filename_matches_extensions() {
        let pg = Dialect::Postgres;
        assert_eq!(pg.format_from_filename("db.sql.gz"), Some(Format::Gzip));
        assert_eq!(pg.format_from_filename("db.dmp"), Some(Format::Custom));
        assert_eq!(pg.format_from_filename("db.sql"), Some(Format::Plain));
        assert_eq!(pg.format_from_filename("db.tar"), None);

        let mongo = Dialect::Mongodb;
        assert_eq!(
            mongo.format_from_filename("db.archive.gz"),
            Some(Format::Gzip)
        );
        assert_eq!(mongo.format_from_filename("db.archive"), Some(Format::Custom));
    }

    #[test]
    fn unsupported_format_is_a_build_error() {
        let opts = DumpOptions {
            format: Format::Custom,
            ..DumpOptions::default()
        };
        assert!(Dialect::Mariadb.dump_command(&opts).is_err());

        let opts = RestoreOptions {
            format: Format::Plain,
            ..RestoreOptions::default()
        };
        assert!(Dialect::Mongodb.restore_command(&opts).is_err());
    }

    #[test]
    fn introspection_queries_are_bare() {
        for dialect in Dialect::ALL {
            assert!(!dialect.list_tables_query().is_empty());
            assert!(!dialect.list_databases_query().is_empty());
        }
    }
}
