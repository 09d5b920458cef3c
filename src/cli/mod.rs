// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dialect::{Dialect, Format};

#[derive(Parser, Debug)]
#[command(name = "kubedump")]
#[command(author, version, about = "Dump and restore databases running in Kubernetes pods")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to the kubeconfig file
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// The namespace scope for this request
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Database dialect. Detected from pod labels if not set.
    #[arg(long, global = true, value_enum)]
    pub dialect: Option<Dialect>,

    /// Force a specific pod. Requires --dialect.
    #[arg(long, global = true)]
    pub pod: Option<String>,

    /// Database name to connect to. Discovered from the pod environment if
    /// not set.
    #[arg(short = 'd', long, global = true)]
    pub dbname: Option<String>,

    /// Database username
    #[arg(short = 'U', long, global = true)]
    pub username: Option<String>,

    /// Database password. Discovered from the pod environment if not set.
    #[arg(short = 'p', long, global = true)]
    pub password: Option<String>,

    /// Compress data over the wire. Lowers bandwidth at the cost of load on
    /// the database pod. Defaults to on; left unset here so the config file
    /// can supply a default without overriding an explicit flag.
    #[arg(
        long,
        global = true,
        value_name = "BOOL",
        default_missing_value = "true",
        num_args = 0..=1,
        require_equals = true,
        action = ArgAction::Set
    )]
    pub remote_gzip: Option<bool>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dump a database to a file (`-` writes to standard output)
    #[command(visible_alias = "export")]
    Dump(DumpArgs),

    /// Restore a database from a dump file
    #[command(visible_alias = "import")]
    Restore(RestoreArgs),

    /// Open an interactive shell in the database, or run a single statement
    #[command(visible_alias = "shell")]
    Exec(ExecArgs),

    /// Check that the database accepts connections
    Status,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Output filename. Generated from namespace, database and timestamp if
    /// omitted.
    pub filename: Option<String>,

    /// Change to this directory before writing the dump
    #[arg(short = 'C', long)]
    pub directory: Option<PathBuf>,

    /// Output format. Inferred from the filename extension if a filename is
    /// given.
    #[arg(short = 'F', long, value_enum)]
    pub format: Option<Format>,

    /// Dump only the specified table(s)
    #[arg(short = 't', long = "table")]
    pub tables: Vec<String>,

    /// Do NOT dump the specified table(s)
    #[arg(short = 'T', long)]
    pub exclude_table: Vec<String>,

    /// Dump structure but NOT data for the specified table(s)
    #[arg(short = 'D', long)]
    pub exclude_table_data: Vec<String>,

    /// Embed drop statements in plain-text dumps
    #[arg(short, long)]
    pub clean: bool,

    /// Use IF EXISTS when dropping objects
    #[arg(long)]
    pub if_exists: bool,

    /// Skip ownership statements in plain-text dumps
    #[arg(short = 'O', long)]
    pub no_owner: bool,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Dump file to restore (`-` reads from standard input is not supported;
    /// a regular file is required for sizing and format detection)
    pub filename: PathBuf,

    /// Input format. Inferred from the filename extension if not set.
    #[arg(short = 'F', long, value_enum)]
    pub format: Option<Format>,

    /// Drop (clean) database objects before recreating them
    #[arg(short, long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub clean: bool,

    /// Use IF EXISTS when dropping objects
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub if_exists: bool,

    /// Skip restoration of object ownership
    #[arg(short = 'O', long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub no_owner: bool,

    /// Restore as a single transaction
    #[arg(short = '1', long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub single_transaction: bool,

    /// Stop the restore on the first error
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub halt_on_error: bool,

    /// Refresh planner statistics after the restore, where the engine
    /// supports it
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub analyze: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Statement to run instead of opening an interactive shell
    #[arg(short, long)]
    pub command: Option<String>,
}
