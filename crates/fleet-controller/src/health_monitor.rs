//! Node liveness monitoring.
//!
//! Every tick probes each registered node's agent in parallel. A node that
//! fails a single probe has all of its replicas evicted from the directory and
//! is skipped for placement; it stays registered and becomes placeable again
//! as soon as a later probe succeeds. No failure history is kept.

use fleet_common::{FleetError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::agent_client::AgentApi;
use crate::config::HealthCheckConfig;
use crate::directory::ReplicaDirectory;

/// Outcome of one health pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: Vec<String>,
    pub unreachable: Vec<String>,
    /// Ids of replicas removed because their node failed its probe.
    pub evicted: Vec<String>,
}

/// Health monitor for agent nodes.
pub struct HealthMonitor {
    directory: ReplicaDirectory,
    agent: Arc<dyn AgentApi>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        directory: ReplicaDirectory,
        agent: Arc<dyn AgentApi>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            directory,
            agent,
            config,
        }
    }

    /// Starts the health monitor task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.check_all_nodes().await;
        }
    }

    /// Probes every node once and evicts the replicas of unreachable ones.
    pub async fn check_all_nodes(&self) -> HealthReport {
        let nodes = self.directory.list_nodes().await;

        // Check all nodes in parallel
        let checks: Vec<_> = nodes
            .into_iter()
            .map(|node| {
                let agent = self.agent.as_ref();
                let timeout = self.config.timeout;
                async move {
                    let result = Self::check_node_health(agent, &node, timeout).await;
                    (node, result)
                }
            })
            .collect();

        let results = futures::future::join_all(checks).await;

        let mut report = HealthReport::default();
        for (node, result) in results {
            match result {
                Ok(()) => {
                    if self.directory.mark_reachable(&node).await {
                        info!("Node {} is reachable again", node);
                    } else {
                        debug!("Node {} is healthy", node);
                    }
                    report.healthy.push(node);
                }
                Err(e) => {
                    warn!("Node {} is down: {}", node, e);
                    let evicted = self.directory.mark_unreachable(&node).await;
                    for id in &evicted {
                        warn!("Replica {} lost due to failure of node {}", id, node);
                    }
                    report.evicted.extend(evicted);
                    report.unreachable.push(node);
                }
            }
        }

        report
    }

    async fn check_node_health(agent: &dyn AgentApi, node: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, agent.probe(node))
            .await
            .map_err(|_| FleetError::NodeUnreachable {
                node: node.to_string(),
                reason: format!("probe timed out after {}ms", timeout.as_millis()),
            })?
    }
}
