//! Controller configuration.
//!
//! Every knob has a default (3 s ticks, 2 s agent timeouts) so a
//! controller can be built with `ControllerConfig::default()` and adjusted
//! field by field.

use std::time::Duration;

use crate::ports::PortRange;

/// What the controller asks agents to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Binary name, resolved by the agent relative to its working directory.
    pub binary: String,
    /// Extra arguments appended after the agent's own `-port`/`-id` flags.
    pub args: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            binary: "worker".to_string(),
            args: Vec::new(),
        }
    }
}

/// Reconcile loop configuration.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval: Duration,
    /// Ports handed to new replicas; allocation is per node.
    pub port_range: PortRange,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            port_range: PortRange::default(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub interval: Duration,
    /// Upper bound for a single probe, on top of the agent client timeout.
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Node agent client configuration.
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// Applied to every start, stop and probe call.
    pub timeout: Duration,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Request router configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// How long to wait for a replica's response headers.
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub service: ServiceConfig,
    pub reconcile: ReconcileConfig,
    pub health: HealthCheckConfig,
    pub agent: AgentClientConfig,
    pub proxy: ProxyConfig,
}
