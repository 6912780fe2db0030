//! HTTP server for the controller
//!
//! Serves the admin API (`/scale`, `/add-node`, `/status`) and forwards every
//! other request to a replica through the [`RequestRouter`].

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use fleet_common::{
    AddNodeRequest, AddNodeResponse, ClusterSnapshot, FleetError, Result, ScaleRequest,
    ScaleResponse,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::controller::Controller;
use crate::proxy::RequestRouter;

#[derive(Clone)]
struct AppState {
    controller: Arc<Controller>,
    router: Arc<RequestRouter>,
}

/// HTTP server for the controller.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(controller: Arc<Controller>) -> Self {
        let router = Arc::new(controller.request_router());
        Self {
            state: AppState { controller, router },
        }
    }

    /// Builds the axum application.
    pub fn app(&self) -> axum::Router {
        axum::Router::new()
            .route("/scale", post(handle_scale))
            .route("/add-node", post(handle_add_node))
            .route("/status", get(handle_status))
            .fallback(handle_proxy)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FleetError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            "Controller HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| FleetError::Transport(format!("Failed to get local addr: {}", e)))?
        );

        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| FleetError::Transport(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// HTTP status for an error surfaced by the API or the proxy.
pub fn status_for(error: &FleetError) -> StatusCode {
    match error {
        FleetError::NoReplicasAvailable | FleetError::NoNodesAvailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FleetError::ProxyUpstreamFailed(_) => StatusCode::BAD_GATEWAY,
        FleetError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FleetError::InvalidRequest(_) | FleetError::JsonSerialization(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: FleetError) -> (StatusCode, String) {
    (status_for(&error), error.to_string())
}

async fn handle_scale(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<ScaleResponse>, (StatusCode, String)> {
    let request: ScaleRequest = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid scale request: {}", e)))?;

    let desired = state
        .controller
        .scale(&request)
        .await
        .map_err(error_response)?;

    Ok(Json(ScaleResponse {
        desired_replicas: desired,
    }))
}

async fn handle_add_node(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<AddNodeResponse>, (StatusCode, String)> {
    let request: AddNodeRequest = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid add-node request: {}", e)))?;

    let nodes = state
        .controller
        .add_node(&request.url)
        .await
        .map_err(error_response)?;

    Ok(Json(AddNodeResponse { nodes }))
}

async fn handle_status(State(state): State<AppState>) -> Json<ClusterSnapshot> {
    Json(state.controller.status().await)
}

async fn handle_proxy(State(state): State<AppState>, request: Request) -> Response {
    match state.router.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Proxy error: {}", e);
            error_response(e).into_response()
        }
    }
}
