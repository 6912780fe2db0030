//! Reconcile loop.
//!
//! Each tick re-derives the full set of actions from the directory:
//! `diff = desired - running`. Planning happens under a read lock, the agent
//! calls run concurrently with no lock held, and the results are committed
//! under one write lock. The loop is level-triggered: a failed start simply
//! leaves the deficit for the next tick.

use fleet_common::{FleetError, Replica, Result, StartRequest};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent_client::AgentApi;
use crate::config::{ReconcileConfig, ServiceConfig};
use crate::directory::{oldest_first, ReplicaDirectory};
use crate::ports::PortAllocator;
use crate::selection::{pick, SelectionPolicy};

/// Outcome of one reconcile tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids of replicas started and registered this tick.
    pub started: Vec<String>,
    /// Ids of replicas stopped and forgotten this tick.
    pub stopped: Vec<String>,
    pub start_failures: usize,
    pub stop_failures: usize,
    /// Starts that could not be placed (no nodes or no free port).
    pub unplaced: usize,
}

impl ReconcileReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// A start decided during planning: where and with which id/port.
#[derive(Debug, Clone)]
struct Placement {
    id: String,
    node: String,
    port: u16,
}

#[derive(Debug, Default)]
struct TickPlan {
    starts: Vec<Placement>,
    stops: Vec<Replica>,
    stop_retries: Vec<Replica>,
    unplaced: usize,
}

pub struct Reconciler {
    directory: ReplicaDirectory,
    agent: Arc<dyn AgentApi>,
    policy: Arc<dyn SelectionPolicy>,
    service: ServiceConfig,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        directory: ReplicaDirectory,
        agent: Arc<dyn AgentApi>,
        policy: Arc<dyn SelectionPolicy>,
        service: ServiceConfig,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            directory,
            agent,
            policy,
            service,
            config,
        }
    }

    /// Starts the reconcile task.
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
            self.tick().await;
        }
    }

    /// Runs one reconcile pass.
    pub async fn tick(&self) -> ReconcileReport {
        let plan = self.plan().await;
        let mut report = ReconcileReport {
            unplaced: plan.unplaced,
            ..Default::default()
        };

        let requests: Vec<StartRequest> = plan
            .starts
            .iter()
            .map(|placement| self.start_request(placement))
            .collect();

        let retry_results = join_all(
            plan.stop_retries
                .iter()
                .map(|replica| self.agent.stop(&replica.node, &replica.id)),
        )
        .await;
        let stop_results = join_all(
            plan.stops
                .iter()
                .map(|replica| self.agent.stop(&replica.node, &replica.id)),
        )
        .await;
        let start_results = join_all(
            plan.starts
                .iter()
                .zip(&requests)
                .map(|(placement, request)| self.agent.start(&placement.node, request)),
        )
        .await;

        let mut state = self.directory.write().await;

        for (replica, result) in plan.stop_retries.iter().zip(retry_results) {
            match result {
                Ok(()) => {
                    state.remove_replica(&replica.id);
                    info!("Replica {} stopped on retry", replica.id);
                    report.stopped.push(replica.id.clone());
                }
                Err(e) => {
                    warn!("Retrying stop of replica {} failed: {}", replica.id, e);
                    report.stop_failures += 1;
                }
            }
        }

        for (replica, result) in plan.stops.iter().zip(stop_results) {
            match result {
                Ok(()) => {
                    state.remove_replica(&replica.id);
                    info!("Replica {} stopped", replica.id);
                    report.stopped.push(replica.id.clone());
                }
                Err(e) => {
                    // keep tracking it so the stop is retried next tick
                    if state.mark_stop_failed(&replica.id) {
                        warn!(
                            "Error stopping replica {}: {}; will retry",
                            replica.id, e
                        );
                    } else {
                        warn!("Error stopping replica {}: {}", replica.id, e);
                    }
                    report.stop_failures += 1;
                }
            }
        }

        for (placement, result) in plan.starts.iter().zip(start_results) {
            match result {
                Ok(()) => {
                    let replica =
                        Replica::running(placement.id.clone(), placement.node.clone(), placement.port);
                    match state.add_replica(replica) {
                        Ok(()) => {
                            info!(
                                "Replica {} started on {} port {}",
                                placement.id, placement.node, placement.port
                            );
                            report.started.push(placement.id.clone());
                        }
                        Err(e) => warn!("Could not register replica {}: {}", placement.id, e),
                    }
                }
                Err(e) => {
                    warn!("Failed to start replica on {}: {}", placement.node, e);
                    report.start_failures += 1;
                }
            }
        }

        report
    }

    /// Reads the directory once and decides this tick's actions.
    async fn plan(&self) -> TickPlan {
        let state = self.directory.read().await;
        let mut plan = TickPlan {
            stop_retries: state.stop_failed_replicas(),
            ..Default::default()
        };

        let diff = i64::from(state.desired()) - state.count_actual() as i64;

        if diff > 0 {
            info!("Scaling up: need {} more replicas", diff);
            let wanted = diff as usize;
            let mut nodes = state.placeable_nodes();
            let mut ports = PortAllocator::from_state(self.config.port_range, &state);
            let mut last_error = None;

            while plan.starts.len() < wanted {
                match self.place(&nodes, &mut ports) {
                    Ok(placement) => plan.starts.push(placement),
                    Err(FleetError::PortsExhausted(node)) => {
                        warn!(
                            "All {} ports of node {} are taken",
                            self.config.port_range.len(),
                            node
                        );
                        // a full node is never a candidate again this tick
                        nodes.retain(|candidate| candidate != &node);
                        last_error = Some(FleetError::PortsExhausted(node));
                        if nodes.is_empty() {
                            break;
                        }
                    }
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                }
            }

            plan.unplaced = wanted - plan.starts.len();
            if let Some(e) = last_error.filter(|_| plan.unplaced > 0) {
                warn!("Cannot place {} replica(s): {}", plan.unplaced, e);
            }
        } else if diff < 0 {
            info!("Scaling down: removing {} replicas", -diff);
            let mut candidates = state.running_replicas();
            oldest_first(&mut candidates);
            for _ in 0..(-diff) {
                let Some(index) = self.policy.select(candidates.len()) else {
                    break;
                };
                plan.stops.push(candidates.remove(index));
            }
        }

        plan
    }

    fn place(&self, nodes: &[String], ports: &mut PortAllocator) -> Result<Placement> {
        let node = pick(self.policy.as_ref(), nodes).ok_or(FleetError::NoNodesAvailable)?;
        let port = ports.allocate(node)?;
        Ok(Placement {
            id: Uuid::new_v4().to_string(),
            node: node.clone(),
            port,
        })
    }

    fn start_request(&self, placement: &Placement) -> StartRequest {
        StartRequest {
            id: placement.id.clone(),
            binary: self.service.binary.clone(),
            port: placement.port,
            args: self.service.args.clone(),
        }
    }
}
