//! Replica directory: the in-memory record of nodes, replicas and the desired
//! replica count.
//!
//! [`ClusterState`] holds the data and enforces its invariants without any
//! locking. [`ReplicaDirectory`] is the shared handle every component uses;
//! it wraps the state in a single `tokio::sync::RwLock`. No method performs
//! I/O while holding the lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fleet_common::{ClusterSnapshot, FleetError, Replica, ReplicaStatus, Result};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cluster state: registered nodes, tracked replicas and the target count.
#[derive(Debug, Default)]
pub struct ClusterState {
    nodes: Vec<String>,
    replicas: HashMap<String, Replica>,
    desired_replicas: u32,
    /// Nodes whose most recent probe failed; skipped for placement.
    unreachable: HashSet<String>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node unless it is already registered.
    ///
    /// Returns `true` if the node was added.
    pub fn register_node(&mut self, url: String) -> bool {
        if self.nodes.contains(&url) {
            return false;
        }
        self.nodes.push(url);
        true
    }

    /// Registered nodes in registration order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Registered nodes that did not fail their most recent probe.
    pub fn placeable_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| !self.unreachable.contains(*node))
            .cloned()
            .collect()
    }

    /// Records a failed probe: the node is skipped for placement and all of
    /// its replicas are evicted. Returns the evicted ids.
    pub fn mark_unreachable(&mut self, node: &str) -> Vec<String> {
        self.unreachable.insert(node.to_string());
        self.evict_node(node)
    }

    /// Records a successful probe. Returns `true` if the node was previously
    /// unreachable.
    pub fn mark_reachable(&mut self, node: &str) -> bool {
        self.unreachable.remove(node)
    }

    pub fn add_replica(&mut self, replica: Replica) -> Result<()> {
        if self.replicas.contains_key(&replica.id) {
            return Err(FleetError::DuplicateReplica(replica.id));
        }
        self.replicas.insert(replica.id.clone(), replica);
        Ok(())
    }

    /// Removes a replica; absent ids are ignored.
    pub fn remove_replica(&mut self, id: &str) -> Option<Replica> {
        self.replicas.remove(id)
    }

    pub fn replica(&self, id: &str) -> Option<&Replica> {
        self.replicas.get(id)
    }

    pub fn iter_replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.values()
    }

    /// All tracked replicas, oldest first (ties broken by id).
    pub fn replicas(&self) -> Vec<Replica> {
        let mut replicas: Vec<Replica> = self.replicas.values().cloned().collect();
        oldest_first(&mut replicas);
        replicas
    }

    /// Replicas in the `Running` state, in no particular order.
    ///
    /// Called on every proxied request, so it stays a single linear pass.
    pub fn running_replicas(&self) -> Vec<Replica> {
        self.replicas
            .values()
            .filter(|r| r.is_running())
            .cloned()
            .collect()
    }

    /// Replicas whose scale-down stop call failed and must be retried.
    pub fn stop_failed_replicas(&self) -> Vec<Replica> {
        self.replicas
            .values()
            .filter(|r| r.status == ReplicaStatus::StopFailed)
            .cloned()
            .collect()
    }

    /// Ids of every replica placed on `node`, whatever its status.
    pub fn replicas_on_node(&self, node: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .replicas
            .values()
            .filter(|r| r.node == node)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Removes every replica placed on `node` and returns their ids.
    pub fn evict_node(&mut self, node: &str) -> Vec<String> {
        let ids = self.replicas_on_node(node);
        for id in &ids {
            self.replicas.remove(id);
        }
        ids
    }

    /// Flags a replica whose stop call failed. Returns `false` if the replica
    /// is no longer tracked (e.g. it was evicted meanwhile).
    pub fn mark_stop_failed(&mut self, id: &str) -> bool {
        match self.replicas.get_mut(id) {
            Some(replica) => {
                replica.status = ReplicaStatus::StopFailed;
                true
            }
            None => false,
        }
    }

    pub fn set_desired(&mut self, desired: u32) {
        self.desired_replicas = desired;
    }

    pub fn desired(&self) -> u32 {
        self.desired_replicas
    }

    /// Number of replicas counted toward the desired total.
    pub fn count_actual(&self) -> usize {
        self.replicas.values().filter(|r| r.is_running()).count()
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.nodes.clone(),
            replicas: self
                .replicas
                .iter()
                .map(|(id, replica)| (id.clone(), replica.clone()))
                .collect(),
            desired_replicas: self.desired_replicas,
        }
    }
}

/// Sorts replicas oldest first, ties broken by id.
pub fn oldest_first(replicas: &mut [Replica]) {
    replicas.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
}

/// Shared handle to the cluster state.
///
/// Cloning the handle is cheap; all clones see the same state. Every method
/// takes the lock exactly once, so compound read-modify-write sequences must
/// go through [`ReplicaDirectory::write`].
#[derive(Debug, Clone, Default)]
pub struct ReplicaDirectory {
    state: Arc<RwLock<ClusterState>>,
}

impl ReplicaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ClusterState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ClusterState> {
        self.state.write().await
    }

    pub async fn register_node(&self, url: String) -> bool {
        self.state.write().await.register_node(url)
    }

    pub async fn list_nodes(&self) -> Vec<String> {
        self.state.read().await.nodes().to_vec()
    }

    pub async fn mark_unreachable(&self, node: &str) -> Vec<String> {
        self.state.write().await.mark_unreachable(node)
    }

    pub async fn mark_reachable(&self, node: &str) -> bool {
        self.state.write().await.mark_reachable(node)
    }

    pub async fn add_replica(&self, replica: Replica) -> Result<()> {
        self.state.write().await.add_replica(replica)
    }

    pub async fn remove_replica(&self, id: &str) -> Option<Replica> {
        self.state.write().await.remove_replica(id)
    }

    pub async fn list_replicas(&self) -> Vec<Replica> {
        self.state.read().await.replicas()
    }

    pub async fn running_replicas(&self) -> Vec<Replica> {
        self.state.read().await.running_replicas()
    }

    pub async fn replicas_on_node(&self, node: &str) -> Vec<String> {
        self.state.read().await.replicas_on_node(node)
    }

    pub async fn evict_node(&self, node: &str) -> Vec<String> {
        self.state.write().await.evict_node(node)
    }

    pub async fn mark_stop_failed(&self, id: &str) -> bool {
        self.state.write().await.mark_stop_failed(id)
    }

    pub async fn set_desired(&self, desired: u32) {
        self.state.write().await.set_desired(desired);
    }

    pub async fn desired(&self) -> u32 {
        self.state.read().await.desired()
    }

    pub async fn count_actual(&self) -> usize {
        self.state.read().await.count_actual()
    }

    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.state.read().await.snapshot()
    }
}
