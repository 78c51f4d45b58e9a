//! Topology graph arena
//!
//! Owns every device and connection and answers adjacency and
//! reachability queries. No rendering calls originate here; visual
//! consequences of graph changes are the orchestrator's business.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TopologyError;

use super::device::{
    Connection, ConnectionId, ConnectionMedium, ConnectionMetadata, Device, DeviceId, DeviceSpec,
    DeviceStatus, Position,
};

/// Minimum normalized similarity for the last-resort fuzzy device match.
const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

/// Per-device status line from the topology lifecycle API.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceProvision {
    /// Device id as named by the provisioner
    pub device: DeviceId,
    /// Whether the emulated device came up
    pub running: bool,
}

/// Arena of devices and connections indexed by id.
///
/// Connections store endpoint ids; each device keeps the set of incident
/// connection ids so removal is symmetric and cheap.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    devices: HashMap<DeviceId, Device>,
    connections: HashMap<ConnectionId, Connection>,
}

impl TopologyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a device.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::DuplicateId`] if the id is already taken.
    pub fn add_device(&mut self, spec: DeviceSpec) -> Result<DeviceId, TopologyError> {
        if self.devices.contains_key(&spec.id) {
            return Err(TopologyError::DuplicateId(spec.id.to_string()));
        }
        let id = spec.id.clone();
        debug!(device = %id, "adding device");
        self.devices.insert(id.clone(), Device::from_spec(spec));
        Ok(id)
    }

    /// Connects two devices. Parallel connections between the same pair
    /// are permitted.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidEndpoint`] if `a == b` or either
    /// id is unknown.
    pub fn add_connection(
        &mut self,
        a: &DeviceId,
        b: &DeviceId,
        medium: ConnectionMedium,
    ) -> Result<ConnectionId, TopologyError> {
        self.add_connection_with_metadata(a, b, medium, ConnectionMetadata::default())
    }

    /// [`add_connection`](Self::add_connection) carrying a subnet/gateway
    /// annotation.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidEndpoint`] if `a == b` or either
    /// id is unknown.
    pub fn add_connection_with_metadata(
        &mut self,
        a: &DeviceId,
        b: &DeviceId,
        medium: ConnectionMedium,
        metadata: ConnectionMetadata,
    ) -> Result<ConnectionId, TopologyError> {
        if a == b {
            return Err(TopologyError::InvalidEndpoint {
                a: a.to_string(),
                b: b.to_string(),
                reason: "self-loop".to_string(),
            });
        }
        for endpoint in [a, b] {
            if !self.devices.contains_key(endpoint) {
                return Err(TopologyError::InvalidEndpoint {
                    a: a.to_string(),
                    b: b.to_string(),
                    reason: format!("unknown device {endpoint}"),
                });
            }
        }

        let id = ConnectionId::generate();
        let connection = Connection {
            id,
            a: a.clone(),
            b: b.clone(),
            medium,
            metadata,
        };
        self.connections.insert(id, connection);
        // Both incident sets; endpoints are known to exist from the check above.
        for endpoint in [a, b] {
            if let Some(device) = self.devices.get_mut(endpoint) {
                device.incident.insert(id);
            }
        }
        Ok(id)
    }

    /// Removes a device and every incident connection.
    ///
    /// Idempotent: removing an absent id is a no-op returning `false`.
    pub fn remove_device(&mut self, id: &DeviceId) -> bool {
        let Some(device) = self.devices.remove(id) else {
            return false;
        };
        for conn_id in device.incident {
            if let Some(conn) = self.connections.remove(&conn_id) {
                // Detach from the surviving endpoint.
                if let Some(peer) = conn.peer_of(id)
                    && let Some(peer_device) = self.devices.get_mut(&peer.clone())
                {
                    peer_device.incident.remove(&conn_id);
                }
            }
        }
        debug!(device = %id, "removed device and incident connections");
        true
    }

    /// Removes a single connection. Idempotent.
    pub fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let Some(conn) = self.connections.remove(&id) else {
            return false;
        };
        for endpoint in [&conn.a, &conn.b] {
            if let Some(device) = self.devices.get_mut(endpoint) {
                device.incident.remove(&id);
            }
        }
        true
    }

    /// Looks up a device by id.
    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Looks up a connection by id.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Iterates over all devices.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Number of devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the graph holds no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sets a device's status. Returns `false` if the id is unknown.
    pub fn set_status(&mut self, id: &DeviceId, status: DeviceStatus) -> bool {
        self.devices.get_mut(id).is_some_and(|device| {
            device.status = status;
            true
        })
    }

    /// Moves a device on the canvas. Returns `false` if the id is unknown.
    pub fn set_position(&mut self, id: &DeviceId, position: Position) -> bool {
        self.devices.get_mut(id).is_some_and(|device| {
            device.position = position;
            true
        })
    }

    /// Adjacent device ids, regardless of address.
    #[must_use]
    pub fn neighbors(&self, id: &DeviceId) -> HashSet<DeviceId> {
        let Some(device) = self.devices.get(id) else {
            return HashSet::new();
        };
        device
            .incident
            .iter()
            .filter_map(|conn_id| self.connections.get(conn_id))
            .filter_map(|conn| conn.peer_of(id))
            .cloned()
            .collect()
    }

    /// Whether `target` can be reached from `source` over undirected
    /// connections.
    ///
    /// `reachable(x, x)` is true for any device in the graph. Otherwise
    /// both endpoints must bear a network address, and the depth-first
    /// traversal only passes through address-bearing devices. A visited
    /// set guarantees termination on cyclic graphs; cost is O(V + E).
    #[must_use]
    pub fn reachable(&self, source: &DeviceId, target: &DeviceId) -> bool {
        if source == target {
            return self.devices.contains_key(source);
        }
        let (Some(src), Some(dst)) = (self.devices.get(source), self.devices.get(target)) else {
            return false;
        };
        // Address-less devices are excluded from traversal entirely,
        // including as endpoints (vacuous unreachable).
        if !src.has_address() || !dst.has_address() {
            return false;
        }

        let mut visited: HashSet<&DeviceId> = HashSet::new();
        let mut stack: Vec<&DeviceId> = vec![source];
        visited.insert(source);

        while let Some(current) = stack.pop() {
            let Some(device) = self.devices.get(current) else {
                continue;
            };
            for conn_id in &device.incident {
                let Some(conn) = self.connections.get(conn_id) else {
                    continue;
                };
                let Some(peer) = conn.peer_of(current) else {
                    continue;
                };
                if visited.contains(peer) {
                    continue;
                }
                let Some(peer_device) = self.devices.get(peer) else {
                    continue;
                };
                if !peer_device.has_address() {
                    continue;
                }
                if peer == target {
                    return true;
                }
                visited.insert(peer);
                stack.push(peer);
            }
        }
        false
    }

    /// Exact display-name lookup.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .values()
            .find(|device| device.name == name)
            .map(|device| device.id.clone())
    }

    /// Last-resort fuzzy device resolution for frames that carry a
    /// free-text label instead of a device id.
    ///
    /// Tries exact id, then exact name, then the best Jaro-Winkler match
    /// over ids and names at or above the similarity threshold. Explicit
    /// ids from the backend are always preferred over this path.
    #[must_use]
    pub fn resolve_fuzzy(&self, label: &str) -> Option<DeviceId> {
        let wanted = DeviceId::from(label);
        if self.devices.contains_key(&wanted) {
            return Some(wanted);
        }
        if let Some(id) = self.find_by_name(label) {
            return Some(id);
        }

        let normalized = label.to_lowercase();
        let mut best: Option<(f64, DeviceId)> = None;
        for device in self.devices.values() {
            for candidate in [&device.id.0, &device.name] {
                let score = strsim::jaro_winkler(&normalized, &candidate.to_lowercase());
                if score >= FUZZY_MATCH_THRESHOLD
                    && best.as_ref().is_none_or(|(prev, _)| score > *prev)
                {
                    best = Some((score, device.id.clone()));
                }
            }
        }
        if let Some((score, ref id)) = best {
            warn!(label, device = %id, score, "resolved device by fuzzy name match");
        }
        best.map(|(_, id)| id)
    }

    /// Applies a provisioning report: devices reported running become
    /// `Normal`, failed devices become `Isolated`. Unknown device ids in
    /// the report are skipped.
    pub fn apply_provision_report(&mut self, report: &[DeviceProvision]) {
        for line in report {
            let status = if line.running {
                DeviceStatus::Normal
            } else {
                DeviceStatus::Isolated
            };
            if !self.set_status(&line.device, status) {
                warn!(device = %line.device, "provision report names unknown device");
            }
        }
    }
}
