// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Thin wrapper around the kube client scoped to one namespace.
//!
//! Provides the three platform capabilities the rest of the tool consumes:
//! listing pods, reading connection details from a pod's environment, and
//! executing a remote command with streamed standard I/O.

use anyhow::{anyhow, bail, Context, Result};
use futures::SinkExt;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, AttachParams, ListParams, TerminalSize};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use super::selector::{self, LabelQuery};
use super::DiscoveryError;

/// Timeout for establishing the connection to the K8s API.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Kubernetes client bound to a single namespace.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    pub namespace: String,
}

impl KubeClient {
    /// Build a client from a kubeconfig file, optionally overriding the
    /// context and namespace. The namespace defaults to the context's.
    pub async fn new(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            None => Kubeconfig::read().context("failed to read kubeconfig")?,
        };

        let options = KubeConfigOptions {
            context: context.map(String::from),
            ..KubeConfigOptions::default()
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .with_context(|| match context {
                Some(ctx) => format!("failed to load kubeconfig context '{ctx}'"),
                None => "failed to load kubeconfig".to_string(),
            })?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        // No read timeout: dump/restore streams are long-lived and may idle
        // while the remote side works.
        config.read_timeout = None;

        let namespace = namespace
            .map(String::from)
            .unwrap_or_else(|| config.default_namespace.clone());

        let client = Client::try_from(config).context("failed to create Kubernetes client")?;

        Ok(Self { client, namespace })
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// List every pod in the namespace.
    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        let pods = self
            .pods()
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list pods in namespace {}", self.namespace))?;
        Ok(pods.items)
    }

    /// Fetch one pod by name.
    pub async fn get_pod(&self, name: &str) -> Result<Pod> {
        self.pods()
            .get(name)
            .await
            .with_context(|| format!("failed to get pod {name} in namespace {}", self.namespace))
    }

    /// Find the target pod for the given label queries; the first match of
    /// the highest-priority non-empty query wins.
    pub async fn find_pod(&self, queries: &[LabelQuery]) -> Result<Pod> {
        let pods = self.list_pods().await?;
        let mut matches = selector::select(&self.namespace, &pods, queries)?;
        Ok(matches.remove(0))
    }

    /// Read the first of `names` set in the pod's container environment,
    /// resolving secret references through the Secrets API.
    pub async fn env_value(&self, pod: &Pod, names: &[&str]) -> Result<String> {
        let pod_name = pod.metadata.name.clone().unwrap_or_default();
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default();

        for name in names {
            for container in containers {
                let Some(env) = &container.env else { continue };
                for var in env {
                    if var.name != *name {
                        continue;
                    }
                    if let Some(value) = &var.value {
                        return Ok(value.clone());
                    }
                    if let Some(secret_ref) = var
                        .value_from
                        .as_ref()
                        .and_then(|source| source.secret_key_ref.as_ref())
                    {
                        let secret_name = secret_ref.name.clone();
                        let secret = self.secrets().get(&secret_name).await.with_context(|| {
                            format!("failed to get secret {secret_name} for env {name}")
                        })?;
                        let data = secret
                            .data
                            .as_ref()
                            .and_then(|data| data.get(&secret_ref.key))
                            .ok_or_else(|| {
                                anyhow!("secret {secret_name} has no key {}", secret_ref.key)
                            })?;
                        return String::from_utf8(data.0.clone()).with_context(|| {
                            format!("secret {secret_name}/{} is not UTF-8", secret_ref.key)
                        });
                    }
                }
            }
        }

        Err(DiscoveryError::EnvNotFound {
            pod: pod_name,
            names: names.iter().map(|s| s.to_string()).collect(),
        }
        .into())
    }

    /// Run `command` in the pod via `sh -c`, streaming standard I/O.
    ///
    /// Remote stderr is forwarded line-by-line into tracing so verbose dump
    /// chatter lands in logs instead of the data stream. The WebSocket
    /// transport injects no keepalive frames into the data channels, which
    /// matters for large binary payloads.
    pub async fn exec<R, W>(
        &self,
        pod: &str,
        command: &str,
        streams: ExecStreams<R, W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let params = AttachParams::default()
            .stdin(streams.stdin.is_some())
            .stdout(streams.stdout.is_some())
            .stderr(!streams.tty)
            .tty(streams.tty);

        let mut attached = self
            .pods()
            .exec(pod, vec!["sh", "-c", command], &params)
            .await
            .with_context(|| format!("failed to attach to pod {pod}"))?;

        let mut remote_stdin = attached.stdin();
        let mut remote_stdout = attached.stdout();
        let remote_stderr = attached.stderr();
        let size_tx = attached.terminal_size();
        let status = attached.take_status();

        let ExecStreams {
            stdin,
            stdout,
            resize,
            ..
        } = streams;

        let stdin_fut = async {
            if let (Some(mut local), Some(mut remote)) = (stdin, remote_stdin.take()) {
                tokio::io::copy(&mut local, &mut remote)
                    .await
                    .context("failed to stream input to remote command")?;
                // Signal EOF so the remote command can finish.
                remote.shutdown().await.ok();
            }
            Ok::<_, anyhow::Error>(())
        };

        let stdout_fut = async {
            if let (Some(remote), Some(mut local)) = (remote_stdout.take(), stdout) {
                let mut remote = remote;
                tokio::io::copy(&mut remote, &mut local)
                    .await
                    .context("failed to stream remote command output")?;
                local.flush().await.ok();
            }
            Ok::<_, anyhow::Error>(())
        };

        let stderr_fut = async {
            if let Some(remote) = remote_stderr {
                let mut lines = BufReader::new(remote).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "remote", pod, "{line}");
                }
            }
        };

        let resize_fut = async {
            if let (Some(rx), Some(tx)) = (resize, size_tx) {
                forward_resizes(rx, tx).await;
            }
        };

        let (stdin_res, stdout_res, (), (), join_res) = tokio::join!(
            stdin_fut,
            stdout_fut,
            stderr_fut,
            resize_fut,
            attached.join()
        );

        join_res.context("remote stream failed")?;
        stdin_res?;
        stdout_res?;

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    bail!(
                        "remote command failed: {}",
                        status
                            .message
                            .unwrap_or_else(|| "no error message".to_string())
                    );
                }
            }
        }

        Ok(())
    }

    /// Run a remote command and capture its standard output as a string.
    pub async fn exec_capture(&self, pod: &str, command: &str) -> Result<String> {
        let (writer, mut reader) = tokio::io::duplex(8 * 1024);
        let exec_fut = self.exec(pod, command, ExecStreams::output(writer));
        let read_fut = async {
            let mut buf = String::new();
            reader.read_to_string(&mut buf).await?;
            Ok::<_, anyhow::Error>(buf)
        };
        let (exec_res, read_res) = tokio::join!(exec_fut, read_fut);
        exec_res?;
        read_res
    }
}

/// Drain local resize events into the remote TTY's size channel until either
/// side closes.
async fn forward_resizes(
    mut local: mpsc::Receiver<TerminalSize>,
    mut remote: futures::channel::mpsc::Sender<TerminalSize>,
) {
    while let Some(size) = local.recv().await {
        if remote.send(size).await.is_err() {
            break;
        }
    }
}

/// Local ends of a remote command's standard streams.
pub struct ExecStreams<R = tokio::io::Empty, W = tokio::io::Sink> {
    pub stdin: Option<R>,
    pub stdout: Option<W>,
    pub tty: bool,
    pub resize: Option<mpsc::Receiver<TerminalSize>>,
}

impl<W> ExecStreams<tokio::io::Empty, W> {
    /// Capture remote stdout only (dumps, captures).
    pub fn output(stdout: W) -> Self {
        Self {
            stdin: None,
            stdout: Some(stdout),
            tty: false,
            resize: None,
        }
    }
}

impl<R> ExecStreams<R, tokio::io::Sink> {
    /// Feed remote stdin only (restores).
    pub fn input(stdin: R) -> Self {
        Self {
            stdin: Some(stdin),
            stdout: None,
            tty: false,
            resize: None,
        }
    }
}

impl<R, W> ExecStreams<R, W> {
    /// Fully interactive: both streams attached, optionally a TTY with
    /// resize forwarding.
    pub fn interactive(
        stdin: R,
        stdout: W,
        tty: bool,
        resize: Option<mpsc::Receiver<TerminalSize>>,
    ) -> Self {
        Self {
            stdin: Some(stdin),
            stdout: Some(stdout),
            tty,
            resize,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn resize_events_reach_the_remote_channel_in_order() {
        let (local_tx, local_rx) = mpsc::channel(4);
        let (remote_tx, mut remote_rx) = futures::channel::mpsc::channel(4);
        let forwarder = tokio::spawn(forward_resizes(local_rx, remote_tx));

        for (width, height) in [(80, 24), (120, 40)] {
            local_tx
                .send(TerminalSize { width, height })
                .await
                .unwrap();
        }
        drop(local_tx);

        let first = remote_rx.next().await.unwrap();
        assert_eq!((first.width, first.height), (80, 24));
        let second = remote_rx.next().await.unwrap();
        assert_eq!((second.width, second.height), (120, 40));
        // Local channel closed, so the forwarder ends and the remote side
        // sees end-of-stream.
        assert!(remote_rx.next().await.is_none());
        forwarder.await.unwrap();
    }

    #[tokio::test]
    async fn forwarder_stops_when_the_remote_side_hangs_up() {
        let (local_tx, local_rx) = mpsc::channel(4);
        let (remote_tx, remote_rx) = futures::channel::mpsc::channel(4);
        drop(remote_rx);
        let forwarder = tokio::spawn(forward_resizes(local_rx, remote_tx));

        local_tx
            .send(TerminalSize {
                width: 80,
                height: 24,
            })
            .await
            .unwrap();
        forwarder.await.unwrap();
    }
}
