// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

pub mod client;
pub mod selector;

pub use client::KubeClient;

use thiserror::Error;

/// Errors raised while locating the target pod and its connection details.
/// All of these are terminal for the calling operation; no retry happens at
/// this layer.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The namespace has no pods at all, so there is nothing to search.
    #[error("no pods in namespace {namespace}")]
    NoPods { namespace: String },

    /// Pods exist, but none satisfied any label query.
    #[error("no pods matched any label query in namespace {namespace}")]
    NoMatch { namespace: String },

    /// None of the candidate environment variables were set on the pod.
    #[error("pod {pod} has none of the environment variables {names:?}")]
    EnvNotFound { pod: String, names: Vec<String> },
}
