pub mod admin;
pub mod agent;
pub mod error;

#[cfg(test)]
mod tests;

pub use admin::{
    normalize_node_url, AddNodeRequest, AddNodeResponse, ClusterSnapshot, Replica,
    ReplicaStatus, ScaleRequest, ScaleResponse,
};
pub use agent::StartRequest;
pub use error::{FleetError, Result};
