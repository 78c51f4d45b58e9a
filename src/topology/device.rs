//! Device and connection types
//!
//! Plain data carried by the [`TopologyGraph`](super::TopologyGraph)
//! arena. Device ids come from the caller (the backend names devices
//! explicitly); connection ids are allocated by the graph.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype wrapper for device ids.
///
/// Backend-supplied, stable across a session; used as the arena key and
/// as the suffix of scheduler effect ids (`scan-<device>`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Creates a new `DeviceId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype wrapper for connection ids, allocated by the graph.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device category, used by the renderer to pick an icon and by the
/// topology generator to name devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Router,
    Firewall,
    Switch,
    Workstation,
    Server,
    Database,
    Web,
    App,
    File,
    Mail,
    Dns,
    Vpn,
    Proxy,
    LoadBalancer,
}

/// Device status as driven by the orchestrator.
///
/// Only [`crate::orchestrator::AttackOrchestrator`] mutates this after
/// topology construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Untouched by any attack
    #[default]
    Normal,
    /// An attack is actively aimed at this device
    Targeted,
    /// Attacker gained control of this device
    Compromised,
    /// Cut off from the network (remediation or provisioning failure)
    Isolated,
}

/// Canvas position consumed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Creates a position from coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between two positions.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: f64::midpoint(self.x, other.x),
            y: f64::midpoint(self.y, other.y),
        }
    }
}

/// Connection medium tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMedium {
    #[default]
    Wired,
    Wireless,
    Tunnel,
}

/// Optional subnet/gateway annotation on a connection.
///
/// The emulated ranges label firewall-adjacent links with the subnet
/// they guard and the gateway address on that segment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    /// Subnet in CIDR notation, e.g. `192.168.100.0/24`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Gateway address on this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Specification for inserting a device into the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Stable device id (collides → `DuplicateId`)
    pub id: DeviceId,
    /// Display name shown next to the rendered icon
    pub name: String,
    /// Device category
    pub category: DeviceCategory,
    /// Network address; devices without one never participate in
    /// reachability traversal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Canvas position
    #[serde(default)]
    pub position: Position,
}

/// A device in the topology arena.
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable id
    pub id: DeviceId,
    /// Display name
    pub name: String,
    /// Category
    pub category: DeviceCategory,
    /// Network address, if any
    pub address: Option<String>,
    /// Current status
    pub status: DeviceStatus,
    /// Canvas position
    pub position: Position,
    /// Incident connection ids, maintained by the graph
    pub(crate) incident: HashSet<ConnectionId>,
}

impl Device {
    pub(crate) fn from_spec(spec: DeviceSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            category: spec.category,
            address: spec.address,
            status: DeviceStatus::Normal,
            position: spec.position,
            incident: HashSet::new(),
        }
    }

    /// Whether this device bears a network address.
    #[must_use]
    pub const fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Ids of connections touching this device.
    #[must_use]
    pub const fn incident_connections(&self) -> &HashSet<ConnectionId> {
        &self.incident
    }
}

/// A connection between two devices (unordered endpoint pair).
#[derive(Debug, Clone)]
pub struct Connection {
    /// Allocated id
    pub id: ConnectionId,
    /// One endpoint
    pub a: DeviceId,
    /// The other endpoint
    pub b: DeviceId,
    /// Medium tag
    pub medium: ConnectionMedium,
    /// Optional subnet/gateway annotation
    pub metadata: ConnectionMetadata,
}

impl Connection {
    /// Given one endpoint, returns the other; `None` if `id` is neither.
    #[must_use]
    pub fn peer_of(&self, id: &DeviceId) -> Option<&DeviceId> {
        if &self.a == id {
            Some(&self.b)
        } else if &self.b == id {
            Some(&self.a)
        } else {
            None
        }
    }

    /// Whether `id` is one of the two endpoints.
    #[must_use]
    pub fn touches(&self, id: &DeviceId) -> bool {
        &self.a == id || &self.b == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str) -> DeviceSpec {
        DeviceSpec {
            id: DeviceId::from(id),
            name: format!("Device {id}"),
            category: DeviceCategory::Server,
            address: Some("10.0.0.1".to_string()),
            position: Position::new(100.0, 200.0),
        }
    }

    #[test]
    fn test_device_from_spec_starts_normal() {
        let device = Device::from_spec(spec("srv-1"));
        assert_eq!(device.status, DeviceStatus::Normal);
        assert!(device.incident.is_empty());
        assert!(device.has_address());
    }

    #[test]
    fn test_device_without_address() {
        let mut s = spec("fw-1");
        s.address = None;
        let device = Device::from_spec(s);
        assert!(!device.has_address());
    }

    #[test]
    fn test_connection_peer_of() {
        let conn = Connection {
            id: ConnectionId::generate(),
            a: DeviceId::from("a"),
            b: DeviceId::from("b"),
            medium: ConnectionMedium::Wired,
            metadata: ConnectionMetadata::default(),
        };
        assert_eq!(conn.peer_of(&DeviceId::from("a")), Some(&DeviceId::from("b")));
        assert_eq!(conn.peer_of(&DeviceId::from("b")), Some(&DeviceId::from("a")));
        assert_eq!(conn.peer_of(&DeviceId::from("c")), None);
        assert!(conn.touches(&DeviceId::from("a")));
        assert!(!conn.touches(&DeviceId::from("c")));
    }

    #[test]
    fn test_position_midpoint() {
        let p = Position::new(0.0, 0.0).midpoint(Position::new(10.0, 20.0));
        assert!((p.x - 5.0).abs() < f64::EPSILON);
        assert!((p.y - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_device_id_display_roundtrip() {
        let id = DeviceId::new("ws-7");
        assert_eq!(id.to_string(), "ws-7");
        assert_eq!(id.as_str(), "ws-7");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&DeviceStatus::Compromised).unwrap();
        assert_eq!(json, "\"compromised\"");
    }

    #[test]
    fn test_medium_deserializes() {
        let medium: ConnectionMedium = serde_json::from_str("\"tunnel\"").unwrap();
        assert_eq!(medium, ConnectionMedium::Tunnel);
    }

    #[test]
    fn test_device_spec_position_defaults() {
        let spec: DeviceSpec = serde_json::from_str(
            r#"{"id": "r-1", "name": "Edge Router", "category": "router"}"#,
        )
        .unwrap();
        assert!(spec.address.is_none());
        assert!((spec.position.x - 0.0).abs() < f64::EPSILON);
    }
}
