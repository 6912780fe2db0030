use thiserror::Error;

/// Errors produced by the fleet controller and its collaborators.
///
/// Reconciliation and health-check errors are logged and absorbed by the
/// control loops; only routing and admin-input errors reach HTTP callers.
#[derive(Error, Debug)]
pub enum FleetError {
    /// No node is registered, so a new replica has nowhere to go.
    #[error("No nodes available for placement")]
    NoNodesAvailable,

    /// A start/stop call to a node agent failed or returned a non-success code.
    #[error("Agent call to {node} failed: {reason}")]
    AgentCallFailed { node: String, reason: String },

    /// A health probe of a node agent failed.
    #[error("Node {node} unreachable: {reason}")]
    NodeUnreachable { node: String, reason: String },

    /// The router has no running replica to forward to.
    #[error("No available replicas")]
    NoReplicasAvailable,

    /// A proxied request failed after being dispatched to a replica.
    #[error("Upstream request failed: {0}")]
    ProxyUpstreamFailed(String),

    #[error("Replica {0} already exists")]
    DuplicateReplica(String),

    /// No free port is left in the configured range on a node.
    #[error("No free port on node {0}")]
    PortsExhausted(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FleetError>;
