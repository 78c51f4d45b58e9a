//! Attack backend HTTP client
//!
//! JSON over HTTP against the attack service and the topology
//! lifecycle endpoint. Every request runs under an explicit timeout;
//! non-2xx responses surface the body text as the failure reason.

use std::time::Duration;

use reqwest::redirect;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::BackendError;
use crate::topology::DeviceProvision;

/// Default request timeout when the config does not say otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Topology lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyAction {
    /// Provision the emulated environment
    Start,
    /// Tear it down
    Stop,
    /// Query per-device state
    Status,
}

impl std::fmt::Display for TopologyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
        };
        write!(f, "{s}")
    }
}

/// Per-device provisioning report from the topology endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyReport {
    /// One line per emulated device
    #[serde(default)]
    pub devices: Vec<DeviceProvision>,
}

/// HTTP client for the attack backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// Creates a client against `base_url` (no trailing slash needed).
    ///
    /// Redirects are not followed; the backend is addressed directly.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be built (should
    /// never happen).
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Launches a full kill-chain attack against `target_host`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on connection failure, timeout, non-2xx
    /// status, or an undecodable body.
    pub async fn execute_full_attack(
        &self,
        target_host: &str,
        attack_type: &str,
    ) -> Result<Value, BackendError> {
        let body = json!({
            "target_host": target_host,
            "attack_type": attack_type,
        });
        self.post_json("/api/attack/execute_full_attack", &body).await
    }

    /// Launches a social-engineering attack against a victim.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on connection failure, timeout, non-2xx
    /// status, or an undecodable body.
    pub async fn execute_social_attack(
        &self,
        victim_url: &str,
        victim_name: &str,
        company: &str,
    ) -> Result<Value, BackendError> {
        let body = json!({
            "victim_url": victim_url,
            "victim_name": victim_name,
            "company": company,
        });
        self.post_json("/api/attack/execute_random_social_attack", &body)
            .await
    }

    /// Queries the attack agent's own status.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on connection failure, timeout, non-2xx
    /// status, or an undecodable body.
    pub async fn agent_status(&self) -> Result<Value, BackendError> {
        self.get_json("/api/attack/status").await
    }

    /// Drives the topology lifecycle endpoint.
    ///
    /// The returned report carries per-device running/failed state,
    /// which seeds initial device statuses.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on connection failure, timeout, non-2xx
    /// status, or an undecodable body.
    pub async fn topology(
        &self,
        action: TopologyAction,
        template: Option<&str>,
    ) -> Result<TopologyReport, BackendError> {
        let mut body = json!({ "action": action });
        if let Some(template) = template {
            body["template"] = json!(template);
        }
        let value = self.post_json("/api/topology", &body).await?;
        serde_json::from_value(value).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "backend POST");
        let request = self.http.post(&url).json(body).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
            .map_err(|e| BackendError::Request(e.to_string()))?;
        self.decode(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, BackendError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "backend GET");
        let request = self.http.get(&url).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
            .map_err(|e| BackendError::Request(e.to_string()))?;
        self.decode(response).await
    }

    async fn decode(&self, response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        let text = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
            .map_err(|e| BackendError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
