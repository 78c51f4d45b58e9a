//! Network topology model
//!
//! An arena of devices and connections indexed by id. Connections store
//! endpoint ids rather than object references, so removing a device is a
//! map operation plus an incident-set sweep — no cycle bookkeeping.

pub mod device;
pub mod graph;

pub use device::{
    Connection, ConnectionId, ConnectionMedium, ConnectionMetadata, Device, DeviceCategory,
    DeviceId, DeviceSpec, DeviceStatus, Position,
};
pub use graph::{DeviceProvision, TopologyGraph};
