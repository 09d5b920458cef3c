// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Readiness check against the selected database pod.

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Global;
use crate::dialect::ExecOptions;

pub async fn run(global: &Global) -> Result<()> {
    let command = global.dialect.status_command(&global.conn);
    debug!(command = %command.redacted(), "built status command");

    let output = global
        .client
        .exec_capture(global.pod_name(), &command.render())
        .await
        .context("database is not accepting connections")?;
    let readiness = output.lines().next().unwrap_or_default().trim();
    debug!(readiness, "readiness check succeeded");

    let tables = introspect(global, global.dialect.list_tables_query()).await?;
    let databases = introspect(global, global.dialect.list_databases_query()).await?;

    println!(
        "{} pod {} is accepting connections: {} databases, {} tables in {}",
        global.dialect,
        global.pod_name(),
        databases.len(),
        tables.len(),
        global.conn.database,
    );
    Ok(())
}

/// Run a headerless introspection statement and split its output into
/// non-empty lines.
async fn introspect(global: &Global, query: &str) -> Result<Vec<String>> {
    let opts = ExecOptions {
        conn: global.conn.clone(),
        command: Some(query.to_string()),
        disable_headers: true,
    };
    let command = global.dialect.exec_command(&opts);
    let output = global
        .client
        .exec_capture(global.pod_name(), &command.render())
        .await
        .context("introspection query failed")?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
