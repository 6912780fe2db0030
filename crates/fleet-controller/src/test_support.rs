//! In-memory agent fake shared by unit tests.

use async_trait::async_trait;
use fleet_common::{FleetError, Result, StartRequest};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

use crate::agent_client::AgentApi;

#[derive(Default)]
pub struct FakeAgent {
    pub started: Mutex<Vec<(String, StartRequest)>>,
    pub stopped: Mutex<Vec<(String, String)>>,
    pub probed: Mutex<Vec<String>>,
    failing_starts: Mutex<HashSet<String>>,
    failing_stops: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_starts_on(&self, node: &str, fail: bool) {
        toggle(&self.failing_starts, node, fail);
    }

    pub fn fail_stops_on(&self, node: &str, fail: bool) {
        toggle(&self.failing_stops, node, fail);
    }

    pub fn set_unreachable(&self, node: &str, unreachable: bool) {
        toggle(&self.unreachable, node, unreachable);
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.lock().unwrap().len()
    }
}

fn toggle(set: &Mutex<HashSet<String>>, node: &str, on: bool) {
    let mut set = set.lock().unwrap();
    if on {
        set.insert(node.to_string());
    } else {
        set.remove(node);
    }
}

#[async_trait]
impl AgentApi for FakeAgent {
    async fn start(&self, node: &str, request: &StartRequest) -> Result<()> {
        if self.failing_starts.lock().unwrap().contains(node) {
            return Err(FleetError::AgentCallFailed {
                node: node.to_string(),
                reason: "HTTP 500 Internal Server Error".to_string(),
            });
        }
        self.started
            .lock()
            .unwrap()
            .push((node.to_string(), request.clone()));
        Ok(())
    }

    async fn stop(&self, node: &str, id: &str) -> Result<()> {
        if self.failing_stops.lock().unwrap().contains(node) {
            return Err(FleetError::AgentCallFailed {
                node: node.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.stopped
            .lock()
            .unwrap()
            .push((node.to_string(), id.to_string()));
        Ok(())
    }

    async fn probe(&self, node: &str) -> Result<()> {
        self.probed.lock().unwrap().push(node.to_string());
        if self.unreachable.lock().unwrap().contains(node) {
            return Err(FleetError::NodeUnreachable {
                node: node.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Agent whose `start` and `stop` calls park until [`GatedAgent::open`] is
/// called. Each parked call announces itself on the receiver returned by
/// [`GatedAgent::new`], then delegates to an inner [`FakeAgent`].
pub struct GatedAgent {
    pub inner: FakeAgent,
    gate: watch::Sender<bool>,
    entered: mpsc::UnboundedSender<String>,
}

impl GatedAgent {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (gate, _) = watch::channel(false);
        let (entered, calls) = mpsc::unbounded_channel();
        let agent = Self {
            inner: FakeAgent::new(),
            gate,
            entered,
        };
        (agent, calls)
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    async fn park(&self, call: String) {
        let mut gate = self.gate.subscribe();
        let _ = self.entered.send(call);
        let _ = gate.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl AgentApi for GatedAgent {
    async fn start(&self, node: &str, request: &StartRequest) -> Result<()> {
        self.park(format!("start {}", request.id)).await;
        self.inner.start(node, request).await
    }

    async fn stop(&self, node: &str, id: &str) -> Result<()> {
        self.park(format!("stop {}", id)).await;
        self.inner.stop(node, id).await
    }

    async fn probe(&self, node: &str) -> Result<()> {
        self.inner.probe(node).await
    }
}
