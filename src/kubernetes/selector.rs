// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Pod selection by prioritized label queries.
//!
//! Queries are evaluated in priority order. A query matching zero pods is
//! skipped (logged, not fatal); matches accumulate across queries, so typical
//! callers take the first element of the result as the single target pod.

use k8s_openapi::api::core::v1::Pod;
use std::fmt;
use tracing::trace;

use super::DiscoveryError;

/// A label selector expression; its priority is its position in the query
/// list handed to [`select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    name: String,
    value: String,
}

impl LabelQuery {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True if the pod carries this label and is running.
    fn matches(&self, pod: &Pod) -> bool {
        is_running(pod)
            && pod
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(&self.name))
                .is_some_and(|value| *value == self.value)
    }
}

impl fmt::Display for LabelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Running")
}

/// Filter `pods` through `queries` in priority order.
///
/// Distinguishes "namespace has no pods at all" from "no pod satisfied any
/// query"; both are terminal for the calling operation.
pub fn select(
    namespace: &str,
    pods: &[Pod],
    queries: &[LabelQuery],
) -> Result<Vec<Pod>, DiscoveryError> {
    if pods.is_empty() {
        return Err(DiscoveryError::NoPods {
            namespace: namespace.to_string(),
        });
    }

    let mut found = Vec::new();
    for query in queries {
        let matched: Vec<Pod> = pods
            .iter()
            .filter(|pod| query.matches(pod))
            .cloned()
            .collect();
        if matched.is_empty() {
            trace!(query = %query, "label query matched no pods");
            continue;
        }
        trace!(query = %query, count = matched.len(), "label query matched pods");
        found.extend(matched);
    }

    if found.is_empty() {
        return Err(DiscoveryError::NoMatch {
            namespace: namespace.to_string(),
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::PodStatus;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    use super::*;

    fn pod(name: &str, labels: &[(&str, &str)], phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    fn queries(pairs: &[(&str, &str)]) -> Vec<LabelQuery> {
        pairs.iter().map(|(k, v)| LabelQuery::new(*k, *v)).collect()
    }

    #[test]
    fn empty_namespace_is_no_pods() {
        let err = select("empty", &[], &queries(&[("app", "postgresql")])).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoPods { .. }));
    }

    #[test]
    fn no_label_match_is_distinct_from_no_pods() {
        let pods = vec![pod("web-0", &[("app", "nginx")], "Running")];
        let err = select("apps", &pods, &queries(&[("app", "postgresql")])).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoMatch { .. }));
    }

    #[test]
    fn second_query_wins_when_first_matches_nothing() {
        let pods = vec![
            pod("web-0", &[("app", "nginx")], "Running"),
            pod("db-0", &[("app", "postgresql")], "Running"),
        ];
        let q = queries(&[
            ("app.kubernetes.io/name", "postgresql"),
            ("app", "postgresql"),
        ]);
        let found = select("apps", &pods, &q).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("db-0"));
    }

    #[test]
    fn matches_accumulate_across_queries_in_priority_order() {
        let pods = vec![
            pod("bitnami-0", &[("app.kubernetes.io/name", "postgresql")], "Running"),
            pod("plain-0", &[("app", "postgresql")], "Running"),
        ];
        let q = queries(&[
            ("app.kubernetes.io/name", "postgresql"),
            ("app", "postgresql"),
        ]);
        let found = select("apps", &pods, &q).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.metadata.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, ["bitnami-0", "plain-0"]);
    }

    #[test]
    fn non_running_pods_are_ignored() {
        let pods = vec![
            pod("db-0", &[("app", "postgresql")], "Pending"),
            pod("db-1", &[("app", "postgresql")], "Running"),
        ];
        let found = select("apps", &pods, &queries(&[("app", "postgresql")])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("db-1"));
    }
}
