//! Node agent client.
//!
//! The controller talks to node agents through the [`AgentApi`] capability so
//! the reconciler and health monitor can be driven by an in-memory fake in
//! tests. [`HttpAgentClient`] is the production implementation speaking the
//! agent's HTTP contract:
//!
//! - `POST /start` with a JSON [`StartRequest`] (200 ok, 409 duplicate id,
//!   500 launch failure)
//! - `GET /stop?id=<id>` (200 ok, 404 unknown id)
//! - `GET /status` used purely as a liveness probe
//!
//! Every call is a single attempt bounded by the configured timeout; retrying
//! is left to the level-triggered loops.

use async_trait::async_trait;
use fleet_common::{FleetError, Result, StartRequest};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::config::AgentClientConfig;

/// Remote operations the controller performs against a node agent.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Asks the agent on `node` to launch a replica.
    ///
    /// Any transport error or non-200 response is `AgentCallFailed`.
    async fn start(&self, node: &str, request: &StartRequest) -> Result<()>;

    /// Asks the agent on `node` to stop replica `id`.
    ///
    /// An agent that does not know the id (404) counts as success: the
    /// process is already gone as far as the agent can tell.
    async fn stop(&self, node: &str, id: &str) -> Result<()>;

    /// Liveness probe; fails with `NodeUnreachable`.
    async fn probe(&self, node: &str) -> Result<()>;
}

/// HTTP implementation of [`AgentApi`].
///
/// Holds one pooled hyper client shared by all calls.
pub struct HttpAgentClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(config: &AgentClientConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            timeout: config.timeout,
        }
    }

    /// Sends a request and reads the whole response, bounded by the timeout.
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes)> {
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| FleetError::Transport(format!("HTTP request failed: {}", e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| FleetError::Transport(format!("Failed to read response: {}", e)))?
                .to_bytes();
            Ok((status, body))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| FleetError::Timeout(self.timeout.as_millis() as u64))?
    }

    fn build(method: Method, uri: String, json: Option<Vec<u8>>) -> Result<Request<Full<Bytes>>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if json.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        builder
            .body(Full::new(Bytes::from(json.unwrap_or_default())))
            .map_err(|e| FleetError::Transport(format!("Failed to build request: {}", e)))
    }
}

fn agent_failure(node: &str, reason: impl ToString) -> FleetError {
    FleetError::AgentCallFailed {
        node: node.to_string(),
        reason: reason.to_string(),
    }
}

fn describe(status: StatusCode, body: &Bytes) -> String {
    let text: String = String::from_utf8_lossy(body).trim().chars().take(200).collect();
    if text.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, text)
    }
}

#[async_trait]
impl AgentApi for HttpAgentClient {
    async fn start(&self, node: &str, request: &StartRequest) -> Result<()> {
        let body = serde_json::to_vec(request)?;
        let http_request = Self::build(
            Method::POST,
            format!("{}/start", node),
            Some(body),
        )
        .map_err(|e| agent_failure(node, e))?;

        let (status, body) = self
            .send(http_request)
            .await
            .map_err(|e| agent_failure(node, e))?;

        if status != StatusCode::OK {
            return Err(agent_failure(node, describe(status, &body)));
        }
        Ok(())
    }

    async fn stop(&self, node: &str, id: &str) -> Result<()> {
        // ids are controller-generated UUIDs, safe to embed in a query string
        let http_request = Self::build(
            Method::GET,
            format!("{}/stop?id={}", node, id),
            None,
        )
        .map_err(|e| agent_failure(node, e))?;

        let (status, body) = self
            .send(http_request)
            .await
            .map_err(|e| agent_failure(node, e))?;

        match status {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!("Agent {} does not know replica {}, treating as stopped", node, id);
                Ok(())
            }
            _ => Err(agent_failure(node, describe(status, &body))),
        }
    }

    async fn probe(&self, node: &str) -> Result<()> {
        let unreachable = |reason: String| FleetError::NodeUnreachable {
            node: node.to_string(),
            reason,
        };

        let http_request = Self::build(
            Method::GET,
            format!("{}/status", node),
            None,
        )
        .map_err(|e| unreachable(e.to_string()))?;

        let (status, body) = self
            .send(http_request)
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(unreachable(describe(status, &body)));
        }
        Ok(())
    }
}
