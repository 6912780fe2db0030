use std::collections::{HashMap, HashSet};

use fleet_common::{FleetError, Result};

use crate::directory::ClusterState;

/// Half-open range of ports `[start, end)` handed out to replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        let range = Self { start, end };
        if range.is_empty() {
            return Err(FleetError::InvalidRequest(format!(
                "empty port range {}..{}",
                start, end
            )));
        }
        Ok(range)
    }

    pub fn len(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port < self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 8000,
            end: 9000,
        }
    }
}

/// Per-node port allocator for one reconcile tick.
///
/// Seeded from the ports every tracked replica holds (including replicas
/// whose stop failed), then hands out the lowest free port per node and
/// remembers it so two starts planned in the same tick never collide.
pub struct PortAllocator {
    range: PortRange,
    taken: HashMap<String, HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            taken: HashMap::new(),
        }
    }

    pub fn from_state(range: PortRange, state: &ClusterState) -> Self {
        let mut allocator = Self::new(range);
        // ports outside the range can never collide with an allocation
        for replica in state.iter_replicas().filter(|r| range.contains(r.port)) {
            allocator
                .taken
                .entry(replica.node.clone())
                .or_default()
                .insert(replica.port);
        }
        allocator
    }

    pub fn allocate(&mut self, node: &str) -> Result<u16> {
        let taken = self.taken.entry(node.to_string()).or_default();
        let port = (self.range.start..self.range.end)
            .find(|port| !taken.contains(port))
            .ok_or_else(|| FleetError::PortsExhausted(node.to_string()))?;
        taken.insert(port);
        Ok(port)
    }
}
