//! Administrative API types and the replica model shared by the controller
//! and its command-line client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::agent::port_string;
use super::error::{FleetError, Result};

/// Lifecycle state of a tracked replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    /// Started successfully; counted toward the desired total and routable.
    Running,
    /// Chosen for scale-down but the agent stop call failed. Still tracked so
    /// the stop can be retried, but neither counted nor routed to.
    StopFailed,
}

/// One running instance of the managed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Replica {
    pub id: String,
    #[serde(rename = "node_url")]
    pub node: String,
    #[serde(with = "port_string")]
    pub port: u16,
    pub started_at: DateTime<Utc>,
    pub status: ReplicaStatus,
}

impl Replica {
    /// Creates a replica record in the `Running` state, stamped now.
    pub fn running(id: impl Into<String>, node: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            node: node.into(),
            port,
            started_at: Utc::now(),
            status: ReplicaStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ReplicaStatus::Running
    }
}

/// Read-only copy of the cluster state served by `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub nodes: Vec<String>,
    pub replicas: BTreeMap<String, Replica>,
    pub desired_replicas: u32,
}

impl ClusterSnapshot {
    /// Number of replicas in the `Running` state.
    pub fn running_count(&self) -> usize {
        self.replicas.values().filter(|r| r.is_running()).count()
    }
}

/// Body of `POST /scale`. The count is signed on the wire so negative
/// values can be rejected with a clear message instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleRequest {
    pub count: i64,
}

impl ScaleRequest {
    /// Validates the requested count and converts it to a replica target.
    pub fn desired(&self) -> Result<u32> {
        if self.count < 0 {
            return Err(FleetError::InvalidRequest(format!(
                "count must be non-negative, got {}",
                self.count
            )));
        }
        u32::try_from(self.count).map_err(|_| {
            FleetError::InvalidRequest(format!("count {} is too large", self.count))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleResponse {
    pub desired_replicas: u32,
}

/// Body of `POST /add-node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddNodeRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddNodeResponse {
    pub nodes: Vec<String>,
}

/// Validates a node agent URL and returns its canonical form.
///
/// Only plain `http://host[:port]` addresses are accepted because agents and
/// replicas are reached over cleartext HTTP/1.1. Trailing slashes are
/// stripped so the same agent is never registered twice.
pub fn normalize_node_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let rest = trimmed.strip_prefix("http://").ok_or_else(|| {
        FleetError::InvalidRequest(format!(
            "node url '{}' must start with http://",
            url
        ))
    })?;

    if rest.is_empty() || rest.starts_with(':') {
        return Err(FleetError::InvalidRequest(format!(
            "node url '{}' has no host",
            url
        )));
    }
    if rest.contains('/') || rest.contains('?') || rest.contains('#') {
        return Err(FleetError::InvalidRequest(format!(
            "node url '{}' must not contain a path",
            url
        )));
    }

    Ok(trimmed.to_string())
}
