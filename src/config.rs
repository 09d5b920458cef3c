// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration.
//!
//! [`Defaults`] holds optional settings from `~/.kubedump/config.json`;
//! command-line flags always win. [`Global`] is the fully resolved,
//! per-invocation configuration passed explicitly into every action, so no
//! component reads ambient state.

use anyhow::{anyhow, bail, Context, Result};
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cli::GlobalArgs;
use crate::dialect::{ConnectionOptions, Dialect};
use crate::kubernetes::{selector, DiscoveryError, KubeClient};

/// Base directory for kubedump files (`~/.kubedump/`).
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".kubedump"))
        .context("could not determine home directory")
}

/// Optional defaults read from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub namespace: Option<String>,
    /// Dialect name or alias, e.g. "postgres" or "mysql".
    #[serde(default)]
    pub dialect: Option<String>,
    #[serde(default)]
    pub remote_gzip: Option<bool>,
}

impl Defaults {
    /// Load defaults from disk, or return empty defaults if no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&base_dir()?.join("config.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Fully resolved configuration for one invocation: the client, the target
/// pod, the dialect, and the connection parameters.
pub struct Global {
    pub client: KubeClient,
    pub dialect: Dialect,
    pub pod: Pod,
    pub conn: ConnectionOptions,
    pub remote_gzip: bool,
    pub quiet: bool,
}

impl Global {
    /// Name of the selected pod.
    pub fn pod_name(&self) -> &str {
        self.pod.metadata.name.as_deref().unwrap_or_default()
    }

    /// Resolve everything needed to run an action: connect, pick the dialect
    /// and pod, and discover connection details from the pod environment.
    ///
    /// `needs_password` is false for actions that only check connectivity;
    /// for those a missing password downgrades from an error to a warning.
    pub async fn setup(args: &GlobalArgs, defaults: &Defaults, needs_password: bool) -> Result<Self> {
        let namespace = args
            .namespace
            .clone()
            .or_else(|| defaults.namespace.clone());
        let client = KubeClient::new(
            args.kubeconfig.as_deref(),
            args.context.as_deref(),
            namespace.as_deref(),
        )
        .await?;
        info!(namespace = %client.namespace, "created kube client");

        let dialect_flag = match (&args.dialect, &defaults.dialect) {
            (Some(dialect), _) => Some(*dialect),
            (None, Some(name)) => Some(Dialect::from_name(name)?),
            (None, None) => None,
        };

        let (dialect, pod) = match (&args.pod, dialect_flag) {
            (Some(pod_name), Some(dialect)) => {
                let pod = client.get_pod(pod_name).await?;
                info!(pod = %pod_name, dialect = %dialect, "using forced pod");
                (dialect, pod)
            }
            (Some(_), None) => bail!("--pod requires --dialect"),
            (None, Some(dialect)) => {
                let pod = client.find_pod(&dialect.pod_labels()).await?;
                info!(
                    pod = pod.metadata.name.as_deref().unwrap_or_default(),
                    dialect = %dialect,
                    "found database pod"
                );
                (dialect, pod)
            }
            (None, None) => detect_dialect(&client).await?,
        };

        let database = match &args.dbname {
            Some(database) => database.clone(),
            None => match client.env_value(&pod, dialect.database_env_names()).await {
                Ok(database) => {
                    info!(database, "configured database from pod env");
                    database
                }
                Err(err) => {
                    let database = dialect.default_database().to_string();
                    warn!(database, error = %err, "could not read database from pod env, using default");
                    database
                }
            },
        };

        let username = match &args.username {
            Some(username) => username.clone(),
            None => match client.env_value(&pod, dialect.user_env_names()).await {
                Ok(username) => {
                    info!(username, "configured user from pod env");
                    username
                }
                Err(err) => {
                    let username = dialect.default_user().to_string();
                    warn!(username, error = %err, "could not read user from pod env, using default");
                    username
                }
            },
        };

        // A dump or restore without a password is a data-risk scenario, not
        // a default-worthy one.
        let discovered = match &args.password {
            Some(password) => Ok(password.clone()),
            None => client.env_value(&pod, dialect.password_env_names()).await,
        };
        let password = resolve_password(discovered, needs_password)?;

        Ok(Self {
            conn: ConnectionOptions {
                host: "127.0.0.1".to_string(),
                port: dialect.default_port(),
                username,
                password,
                database,
            },
            client,
            dialect,
            pod,
            remote_gzip: resolve_remote_gzip(args.remote_gzip, defaults.remote_gzip),
            quiet: args.quiet,
        })
    }
}

/// An explicit flag beats the config file, which beats the built-in default
/// of compressing on the wire.
fn resolve_remote_gzip(flag: Option<bool>, default: Option<bool>) -> bool {
    flag.or(default).unwrap_or(true)
}

/// For actions that move data a missing password is fatal. Actions that only
/// check connectivity proceed with an empty password and a warning, since a
/// readiness check may not authenticate at all.
fn resolve_password(discovered: Result<String>, required: bool) -> Result<String> {
    match discovered {
        Ok(password) => Ok(password),
        Err(err) if required => {
            Err(err.context("database password not discoverable from pod env; pass --password"))
        }
        Err(err) => {
            warn!(error = %err, "proceeding without a database password");
            Ok(String::new())
        }
    }
}

/// Try each dialect's label queries against the namespace's pods; the first
/// dialect with a matching running pod wins.
async fn detect_dialect(client: &KubeClient) -> Result<(Dialect, Pod)> {
    let pods = client.list_pods().await?;
    for dialect in Dialect::ALL {
        match selector::select(&client.namespace, &pods, &dialect.pod_labels()) {
            Ok(mut matches) => {
                let pod = matches.remove(0);
                info!(
                    dialect = %dialect,
                    pod = pod.metadata.name.as_deref().unwrap_or_default(),
                    "detected database dialect"
                );
                return Ok((dialect, pod));
            }
            Err(DiscoveryError::NoMatch { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(anyhow!(
        "could not detect database dialect in namespace {}; pass --dialect",
        client.namespace
    ))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_config_file_yields_empty_defaults() {
        let dir = TempDir::new().unwrap();
        let defaults = Defaults::load_from(&dir.path().join("config.json")).unwrap();
        assert!(defaults.namespace.is_none());
        assert!(defaults.dialect.is_none());
        assert!(defaults.remote_gzip.is_none());
    }

    #[test]
    fn config_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"namespace": "prod", "dialect": "psql", "remote_gzip": false}"#,
        )
        .unwrap();
        let defaults = Defaults::load_from(&path).unwrap();
        assert_eq!(defaults.namespace.as_deref(), Some("prod"));
        assert_eq!(
            Dialect::from_name(defaults.dialect.as_deref().unwrap()).unwrap(),
            Dialect::Postgres
        );
        assert_eq!(defaults.remote_gzip, Some(false));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Defaults::load_from(&path).is_err());
    }

    #[test]
    fn explicit_remote_gzip_flag_overrides_the_config_file() {
        assert!(resolve_remote_gzip(Some(true), Some(false)));
        assert!(!resolve_remote_gzip(Some(false), Some(true)));
        assert!(!resolve_remote_gzip(None, Some(false)));
        assert!(resolve_remote_gzip(None, None));
    }

    #[test]
    fn missing_password_is_fatal_only_when_required() {
        assert!(resolve_password(Err(anyhow!("not found")), true).is_err());
        assert_eq!(resolve_password(Err(anyhow!("not found")), false).unwrap(), "");
        assert_eq!(
            resolve_password(Ok("hunter2".to_string()), true).unwrap(),
            "hunter2"
        );
    }
}
