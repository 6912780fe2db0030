//! Request router.
//!
//! Forwards any request the control API does not claim to one running
//! replica, chosen per request, and relays the replica's response verbatim.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response, Uri};
use fleet_common::{FleetError, Replica, Result};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ProxyConfig;
use crate::directory::ReplicaDirectory;
use crate::selection::{pick, SelectionPolicy};

/// Connection-scoped headers that must not be forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct RequestRouter {
    directory: ReplicaDirectory,
    policy: Arc<dyn SelectionPolicy>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl RequestRouter {
    pub fn new(
        directory: ReplicaDirectory,
        policy: Arc<dyn SelectionPolicy>,
        config: &ProxyConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            directory,
            policy,
            client,
            timeout: config.timeout,
        }
    }

    /// Chooses the replica that will serve the next request.
    pub async fn pick_replica(&self) -> Result<Replica> {
        let replicas = self.directory.running_replicas().await;
        pick(self.policy.as_ref(), &replicas)
            .cloned()
            .ok_or(FleetError::NoReplicasAvailable)
    }

    /// Forwards `request` to a replica and returns its response.
    ///
    /// Method, path, query, body and end-to-end headers are passed through
    /// unchanged. No retry is attempted on another replica.
    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>> {
        let replica = self.pick_replica().await?;
        let target = target_uri(&replica, request.uri())?;
        debug!(
            "Proxying {} {} to replica {} at {}",
            request.method(),
            request.uri(),
            replica.id,
            target
        );

        *request.uri_mut() = target;
        strip_hop_by_hop(request.headers_mut());
        // the client derives Host from the target uri
        request.headers_mut().remove(header::HOST);

        let mut response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| FleetError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| {
                FleetError::ProxyUpstreamFailed(format!(
                    "replica {} on {}: {}",
                    replica.id, replica.node, e
                ))
            })?;

        strip_hop_by_hop(response.headers_mut());
        Ok(response.map(Body::new))
    }
}

/// Builds the upstream uri: the replica's node host, the replica's port, and
/// the original path and query.
pub fn target_uri(replica: &Replica, original: &Uri) -> Result<Uri> {
    let node: Uri = replica.node.parse().map_err(|e| {
        FleetError::InvalidRequest(format!("invalid node url {}: {}", replica.node, e))
    })?;
    let host = node.host().ok_or_else(|| {
        FleetError::InvalidRequest(format!("node url {} has no host", replica.node))
    })?;
    let scheme = node.scheme_str().unwrap_or("http");
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!("{}://{}:{}{}", scheme, host, replica.port, path_and_query)
        .parse()
        .map_err(|e| FleetError::InvalidRequest(format!("invalid upstream uri: {}", e)))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // headers named by the Connection header are connection-scoped too
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}
