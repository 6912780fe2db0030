//! # Fleet CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run a controller with two agent nodes
//! fleet controller -b 0.0.0.0:8000 -n http://10.0.0.1:9000 -n http://10.0.0.2:9000
//!
//! # Ask for three replicas, register another node, inspect state
//! fleet scale http://127.0.0.1:8000 3
//! fleet add-node http://127.0.0.1:8000 http://10.0.0.3:9000
//! fleet status http://127.0.0.1:8000 | jq '.replicas'
//! ```

use anyhow::{anyhow, Result};
use argh::FromArgs;
use fleet_cli::admin::AdminClient;
use fleet_controller::{Controller, ControllerConfig, HttpServer, PortRange};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when `--binary` is not given.
const SERVICE_BINARY_ENV: &str = "FLEET_SERVICE_BINARY";

#[derive(FromArgs)]
/// Fleet - replica controller and request router for a single service
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Controller(ControllerArgs),
    Scale(ScaleArgs),
    AddNode(AddNodeArgs),
    Status(StatusArgs),
}

/// Arguments for running the controller.
///
/// # Example
///
/// ```bash
/// fleet controller -b 0.0.0.0:8000 \
///   -n http://10.0.0.1:9000 \
///   --binary api-server --arg=-verbose \
///   --reconcile-interval 5
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "controller")]
/// run the fleet controller
struct ControllerArgs {
    /// address to bind the admin API and proxy to
    #[argh(option, short = 'b', default = "\"0.0.0.0:8000\".into()")]
    bind: String,

    /// agent node to register at startup (repeatable)
    ///
    /// Must be http://host[:port] with no path.
    #[argh(option, short = 'n', long = "node")]
    nodes: Vec<String>,

    /// binary agents launch for each replica
    ///
    /// Falls back to the FLEET_SERVICE_BINARY env var, then "worker".
    #[argh(option, long = "binary")]
    binary: Option<String>,

    /// extra argument passed to every replica (repeatable)
    #[argh(option, long = "arg")]
    args: Vec<String>,

    /// seconds between reconcile ticks
    #[argh(option, long = "reconcile-interval", default = "3")]
    reconcile_interval_secs: u64,

    /// seconds between node health checks
    #[argh(option, long = "health-check-interval", default = "3")]
    health_check_interval_secs: u64,

    /// timeout for each health probe in milliseconds
    #[argh(option, long = "health-check-timeout", default = "2000")]
    health_check_timeout_ms: u64,

    /// timeout for agent start/stop calls in milliseconds
    #[argh(option, long = "agent-timeout", default = "2000")]
    agent_timeout_ms: u64,

    /// timeout for proxied requests in milliseconds
    #[argh(option, long = "proxy-timeout", default = "30000")]
    proxy_timeout_ms: u64,

    /// first port handed to replicas
    #[argh(option, long = "port-range-start", default = "8000")]
    port_range_start: u16,

    /// end of the replica port range (exclusive)
    #[argh(option, long = "port-range-end", default = "9000")]
    port_range_end: u16,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "scale")]
/// set the desired replica count
struct ScaleArgs {
    /// controller address (e.g. http://127.0.0.1:8000)
    #[argh(positional)]
    controller: String,

    /// desired number of replicas; a negative value reads as an unknown
    /// flag unless it follows `--`, and the controller refuses it either way
    #[argh(positional)]
    count: i64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "add-node")]
/// register an agent node
struct AddNodeArgs {
    /// controller address (e.g. http://127.0.0.1:8000)
    #[argh(positional)]
    controller: String,

    /// agent base url (e.g. http://10.0.0.3:9000)
    #[argh(positional)]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
/// print the controller's cluster state as JSON
struct StatusArgs {
    /// controller address (e.g. http://127.0.0.1:8000)
    #[argh(positional)]
    controller: String,
}

impl ControllerArgs {
    fn to_config(&self) -> Result<ControllerConfig> {
        let mut config = ControllerConfig::default();

        config.service.binary = self
            .binary
            .clone()
            .or_else(|| std::env::var(SERVICE_BINARY_ENV).ok())
            .unwrap_or_else(|| config.service.binary.clone());
        config.service.args = self.args.clone();

        config.reconcile.interval = Duration::from_secs(self.reconcile_interval_secs);
        config.reconcile.port_range = PortRange::new(self.port_range_start, self.port_range_end)?;

        config.health.interval = Duration::from_secs(self.health_check_interval_secs);
        config.health.timeout = Duration::from_millis(self.health_check_timeout_ms);
        config.agent.timeout = Duration::from_millis(self.agent_timeout_ms);
        config.proxy.timeout = Duration::from_millis(self.proxy_timeout_ms);

        if config.reconcile.interval.is_zero() || config.health.interval.is_zero() {
            return Err(anyhow!("Intervals must be at least one second"));
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    match cli.command {
        Commands::Controller(args) => {
            // Set default log level to INFO, but allow RUST_LOG env var to override
            let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            tracing_subscriber::fmt().with_env_filter(env_filter).init();

            run_controller(args).await
        }
        // no logging for admin commands: stdout carries only the JSON
        Commands::Scale(args) => {
            let result = AdminClient::new(&args.controller)?.scale(args.count).await?;
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
        Commands::AddNode(args) => {
            let result = AdminClient::new(&args.controller)?.add_node(&args.url).await?;
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
        Commands::Status(args) => {
            let result = AdminClient::new(&args.controller)?.status().await?;
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
    }
}

async fn run_controller(args: ControllerArgs) -> Result<()> {
    let config = args.to_config()?;
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    tracing::info!("Starting fleet controller");
    tracing::info!("Binding to: {}", addr);
    tracing::info!(
        "Service binary: {} {:?}",
        config.service.binary,
        config.service.args
    );

    let controller = Arc::new(Controller::new(config));
    for node in &args.nodes {
        controller
            .add_node(node)
            .await
            .map_err(|e| anyhow!("Invalid node address '{}': {}", node, e))?;
    }
    if args.nodes.is_empty() {
        tracing::warn!("No nodes specified! Use --node <url> or POST /add-node to add nodes.");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;

    let _background = controller.spawn_background();
    HttpServer::new(controller)
        .serve(listener, shutdown_signal())
        .await?;

    tracing::info!("Controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
