//! Session configuration schema
//!
//! Everything is optional with workable defaults: an empty YAML file is
//! a valid session against a local backend. Durations are humantime
//! strings (`"30s"`, `"2m"`); validation checks they parse, and the
//! typed accessors fall back to defaults on the (already-validated)
//! happy path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorTiming;
use crate::topology::{ConnectionMedium, DeviceSpec};

fn parse_duration_or(value: &str, default: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(default)
}

/// Root session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Attack backend endpoints
    #[serde(default)]
    pub backend: BackendConfig,
    /// Push channel
    #[serde(default)]
    pub push: PushConfig,
    /// Diagram layout and provisioning template
    #[serde(default)]
    pub topology: TopologyConfig,
    /// Attack defaults
    #[serde(default)]
    pub attack: AttackConfig,
    /// Effect and polling cadence
    #[serde(default)]
    pub effects: EffectsConfig,
}

/// Attack backend endpoints and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the attack backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout as a humantime string
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Parsed request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        parse_duration_or(&self.request_timeout, Duration::from_secs(30))
    }
}

/// Push channel endpoint and reconnect budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// Websocket URL delivering status frames
    #[serde(default = "default_push_url")]
    pub url: String,
    /// Bounded reconnect attempts before giving up
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
    /// Base reconnect delay; attempt n waits n times this
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,
}

fn default_push_url() -> String {
    "ws://localhost:8000/ws/logs".to_string()
}

const fn default_max_reconnects() -> u32 {
    5
}

fn default_reconnect_delay() -> String {
    "2s".to_string()
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: default_push_url(),
            max_reconnects: default_max_reconnects(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

impl PushConfig {
    /// Parsed base reconnect delay.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        parse_duration_or(&self.reconnect_delay, Duration::from_secs(2))
    }
}

/// One connection line in the topology section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionEntry {
    /// First endpoint device id
    pub a: String,
    /// Second endpoint device id
    pub b: String,
    /// Medium tag
    #[serde(default)]
    pub medium: ConnectionMedium,
    /// Optional subnet annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Optional gateway annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Diagram layout plus the provisioning template name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    /// Template forwarded to the topology lifecycle API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Devices to place on the diagram
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    /// Connections between them
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

/// Attack submission defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttackConfig {
    /// Attack type when the operator does not pick one
    #[serde(default = "default_attack_type")]
    pub default_type: String,
    /// Company name used by social-engineering lures
    #[serde(default = "default_company")]
    pub company: String,
}

fn default_attack_type() -> String {
    "auto".to_string()
}

fn default_company() -> String {
    "ACME_CORP".to_string()
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            default_type: default_attack_type(),
            company: default_company(),
        }
    }
}

/// Effect and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectsConfig {
    /// Gap between repeated scan pulses
    #[serde(default = "default_scan_interval")]
    pub scan_interval: String,
    /// Gap between background traffic packets
    #[serde(default = "default_traffic_interval")]
    pub traffic_interval: String,
    /// Polling fallback cadence
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_scan_interval() -> String {
    "3s".to_string()
}

fn default_traffic_interval() -> String {
    "800ms".to_string()
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
            traffic_interval: default_traffic_interval(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl EffectsConfig {
    /// Typed timing for the orchestrator.
    #[must_use]
    pub fn timing(&self) -> OrchestratorTiming {
        let defaults = OrchestratorTiming::default();
        OrchestratorTiming {
            scan_interval: parse_duration_or(&self.scan_interval, defaults.scan_interval),
            traffic_interval: parse_duration_or(&self.traffic_interval, defaults.traffic_interval),
            poll_interval: parse_duration_or(&self.poll_interval, defaults.poll_interval),
        }
    }
}
