pub mod agent_client;
pub mod config;
pub mod controller;
pub mod directory;
pub mod health_monitor;
pub mod http_server;
pub mod ports;
pub mod proxy;
pub mod reconciler;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_client::{AgentApi, HttpAgentClient};
pub use config::{
    AgentClientConfig, ControllerConfig, HealthCheckConfig, ProxyConfig, ReconcileConfig,
    ServiceConfig,
};
pub use controller::{BackgroundTasks, Controller};
pub use directory::{ClusterState, ReplicaDirectory};
pub use health_monitor::{HealthMonitor, HealthReport};
pub use http_server::HttpServer;
pub use ports::{PortAllocator, PortRange};
pub use proxy::RequestRouter;
pub use reconciler::{ReconcileReport, Reconciler};
pub use selection::{FirstSelection, RandomSelection, RoundRobinSelection, SelectionPolicy};
