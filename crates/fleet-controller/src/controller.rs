use fleet_common::{normalize_node_url, ClusterSnapshot, Result, ScaleRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::agent_client::{AgentApi, HttpAgentClient};
use crate::config::ControllerConfig;
use crate::directory::ReplicaDirectory;
use crate::health_monitor::{HealthMonitor, HealthReport};
use crate::proxy::RequestRouter;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::selection::{RandomSelection, SelectionPolicy};

/// Fleet controller.
///
/// Owns the replica directory and wires it to the pieces that act on it:
///
/// 1. **Reconciler**: converges running replicas toward the desired count
/// 2. **Health monitor**: evicts replicas of nodes whose agent stops answering
/// 3. **Request router**: forwards client traffic to a running replica
///
/// The admin operations (`scale`, `add_node`, `status`) only touch the
/// directory; the background loops do the agent calls.
pub struct Controller {
    directory: ReplicaDirectory,
    agent: Arc<dyn AgentApi>,
    policy: Arc<dyn SelectionPolicy>,
    config: ControllerConfig,
}

/// Handles of the running background loops. Dropping it stops them.
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Controller {
    /// Creates a controller talking to agents over HTTP with random
    /// placement and routing.
    pub fn new(config: ControllerConfig) -> Self {
        let agent = Arc::new(HttpAgentClient::new(&config.agent));
        Self::with_parts(config, agent, Arc::new(RandomSelection))
    }

    /// Creates a controller with an explicit agent implementation and
    /// selection policy.
    pub fn with_parts(
        config: ControllerConfig,
        agent: Arc<dyn AgentApi>,
        policy: Arc<dyn SelectionPolicy>,
    ) -> Self {
        Self {
            directory: ReplicaDirectory::new(),
            agent,
            policy,
            config,
        }
    }

    pub fn directory(&self) -> &ReplicaDirectory {
        &self.directory
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.directory.clone(),
            self.agent.clone(),
            self.policy.clone(),
            self.config.service.clone(),
            self.config.reconcile.clone(),
        )
    }

    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.directory.clone(),
            self.agent.clone(),
            self.config.health.clone(),
        )
    }

    pub fn request_router(&self) -> RequestRouter {
        RequestRouter::new(self.directory.clone(), self.policy.clone(), &self.config.proxy)
    }

    /// Starts the reconcile and health loops.
    pub fn spawn_background(&self) -> BackgroundTasks {
        info!(
            "Starting reconcile loop every {:?} and health checks every {:?}",
            self.config.reconcile.interval, self.config.health.interval
        );
        BackgroundTasks {
            handles: vec![self.reconciler().spawn(), self.health_monitor().spawn()],
        }
    }

    /// Records a new desired replica count. Returns the accepted value.
    pub async fn scale(&self, request: &ScaleRequest) -> Result<u32> {
        let desired = request.desired()?;
        self.directory.set_desired(desired).await;
        info!("Desired replicas set to {}", desired);
        Ok(desired)
    }

    /// Registers an agent node. Returns the node list after registration.
    pub async fn add_node(&self, url: &str) -> Result<Vec<String>> {
        let url = normalize_node_url(url)?;
        if self.directory.register_node(url.clone()).await {
            info!("Node {} registered", url);
        }
        Ok(self.directory.list_nodes().await)
    }

    pub async fn status(&self) -> ClusterSnapshot {
        self.directory.snapshot().await
    }

    pub async fn reconcile_once(&self) -> ReconcileReport {
        self.reconciler().tick().await
    }

    pub async fn check_health_once(&self) -> HealthReport {
        self.health_monitor().check_all_nodes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{FirstSelection, RoundRobinSelection};
    use crate::test_support::FakeAgent;
    use fleet_common::FleetError;

    fn controller_with(agent: &Arc<FakeAgent>, policy: Arc<dyn SelectionPolicy>) -> Controller {
        Controller::with_parts(ControllerConfig::default(), agent.clone(), policy)
    }

    #[tokio::test]
    async fn test_scale_records_desired_count() {
        let controller = controller_with(&Arc::new(FakeAgent::new()), Arc::new(FirstSelection));

        let desired = controller.scale(&ScaleRequest { count: 4 }).await.unwrap();

        assert_eq!(desired, 4);
        assert_eq!(controller.status().await.desired_replicas, 4);
    }

    #[tokio::test]
    async fn test_scale_rejects_negative_count() {
        let controller = controller_with(&Arc::new(FakeAgent::new()), Arc::new(FirstSelection));
        controller.scale(&ScaleRequest { count: 2 }).await.unwrap();

        let result = controller.scale(&ScaleRequest { count: -1 }).await;

        assert!(matches!(result, Err(FleetError::InvalidRequest(_))));
        assert_eq!(controller.status().await.desired_replicas, 2);
    }

    #[tokio::test]
    async fn test_add_node_is_idempotent() {
        let controller = controller_with(&Arc::new(FakeAgent::new()), Arc::new(FirstSelection));

        controller.add_node("http://10.0.0.1:9000").await.unwrap();
        let nodes = controller.add_node("http://10.0.0.1:9000/").await.unwrap();

        assert_eq!(nodes, vec!["http://10.0.0.1:9000".to_string()]);
    }

    #[tokio::test]
    async fn test_add_node_rejects_bad_url() {
        let controller = controller_with(&Arc::new(FakeAgent::new()), Arc::new(FirstSelection));

        let result = controller.add_node("10.0.0.1:9000").await;

        assert!(matches!(result, Err(FleetError::InvalidRequest(_))));
        assert!(controller.status().await.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_scale_up_on_one_node() {
        let agent = Arc::new(FakeAgent::new());
        let controller = controller_with(&agent, Arc::new(FirstSelection));
        controller.add_node("http://n1").await.unwrap();
        controller.scale(&ScaleRequest { count: 3 }).await.unwrap();

        // nothing happens until the reconciler runs
        assert!(controller.status().await.replicas.is_empty());

        controller.reconcile_once().await;

        let status = controller.status().await;
        assert_eq!(status.replicas.len(), 3);
        assert!(status.replicas.values().all(|r| r.node == "http://n1"));
        assert_eq!(agent.start_count(), 3);
    }

    #[tokio::test]
    async fn test_single_node_failure_without_spare_node() {
        let agent = Arc::new(FakeAgent::new());
        let controller = controller_with(&agent, Arc::new(FirstSelection));
        controller.add_node("http://n1").await.unwrap();
        controller.scale(&ScaleRequest { count: 3 }).await.unwrap();
        controller.reconcile_once().await;

        agent.set_unreachable("http://n1", true);
        let health = controller.check_health_once().await;
        assert_eq!(health.evicted.len(), 3);

        let report = controller.reconcile_once().await;
        assert_eq!(report.unplaced, 3);
        assert_eq!(agent.start_count(), 3);
        assert_eq!(controller.status().await.running_count(), 0);

        // recovery needs a successful probe before placement resumes
        agent.set_unreachable("http://n1", false);
        controller.check_health_once().await;
        controller.reconcile_once().await;
        assert_eq!(controller.status().await.running_count(), 3);
    }

    #[tokio::test]
    async fn test_replicas_move_to_surviving_node() {
        let agent = Arc::new(FakeAgent::new());
        let controller = controller_with(&agent, Arc::new(RoundRobinSelection::new()));
        controller.add_node("http://n1").await.unwrap();
        controller.add_node("http://n2").await.unwrap();
        controller.scale(&ScaleRequest { count: 4 }).await.unwrap();
        controller.reconcile_once().await;
        assert_eq!(controller.directory().replicas_on_node("http://n1").await.len(), 2);

        agent.set_unreachable("http://n1", true);
        controller.check_health_once().await;
        controller.reconcile_once().await;

        let status = controller.status().await;
        assert_eq!(status.running_count(), 4);
        assert!(status.replicas.values().all(|r| r.node == "http://n2"));
    }

    #[tokio::test]
    async fn test_background_tasks_reconcile() {
        let agent = Arc::new(FakeAgent::new());
        let mut config = ControllerConfig::default();
        config.reconcile.interval = std::time::Duration::from_millis(20);
        config.health.interval = std::time::Duration::from_millis(20);
        let controller = Controller::with_parts(config, agent.clone(), Arc::new(FirstSelection));
        controller.add_node("http://n1").await.unwrap();
        controller.scale(&ScaleRequest { count: 2 }).await.unwrap();

        let tasks = controller.spawn_background();
        assert_eq!(tasks.len(), 2);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        drop(tasks);

        assert_eq!(controller.status().await.running_count(), 2);
        assert_eq!(agent.start_count(), 2);
    }
}
