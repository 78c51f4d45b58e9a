//! Session configuration validation
//!
//! Produces a list of issues rather than failing on the first problem,
//! so an operator sees everything wrong with a file at once.

use std::collections::HashSet;

use crate::error::{Severity, ValidationIssue};

use super::schema::SessionConfig;

/// Validates a [`SessionConfig`].
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    /// Runs every check and returns the issues found, errors first.
    #[must_use]
    pub fn validate(config: &SessionConfig) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        Self::check_urls(config, &mut issues);
        Self::check_durations(config, &mut issues);
        Self::check_topology(config, &mut issues);

        issues.sort_by_key(|issue| match issue.severity {
            Severity::Error => 0,
            Severity::Warning => 1,
        });
        issues
    }

    /// Whether the issue list contains any hard errors.
    #[must_use]
    pub fn has_errors(issues: &[ValidationIssue]) -> bool {
        issues.iter().any(|issue| issue.severity == Severity::Error)
    }

    fn check_urls(config: &SessionConfig, issues: &mut Vec<ValidationIssue>) {
        if config.backend.base_url.trim().is_empty() {
            issues.push(error("backend.base_url", "must not be empty"));
        } else if !config.backend.base_url.starts_with("http://")
            && !config.backend.base_url.starts_with("https://")
        {
            issues.push(error("backend.base_url", "must be an http(s) URL"));
        }

        if config.push.url.trim().is_empty() {
            issues.push(error("push.url", "must not be empty"));
        } else if !config.push.url.starts_with("ws://") && !config.push.url.starts_with("wss://") {
            issues.push(error("push.url", "must be a ws(s) URL"));
        }

        if config.push.max_reconnects == 0 {
            issues.push(warning(
                "push.max_reconnects",
                "zero reconnects means any drop ends the push channel",
            ));
        }
    }

    fn check_durations(config: &SessionConfig, issues: &mut Vec<ValidationIssue>) {
        let fields = [
            ("backend.request_timeout", &config.backend.request_timeout),
            ("push.reconnect_delay", &config.push.reconnect_delay),
            ("effects.scan_interval", &config.effects.scan_interval),
            ("effects.traffic_interval", &config.effects.traffic_interval),
            ("effects.poll_interval", &config.effects.poll_interval),
        ];
        for (path, value) in fields {
            match humantime::parse_duration(value) {
                Ok(parsed) => {
                    if parsed.is_zero() {
                        issues.push(error(path, "must be a positive duration"));
                    }
                }
                Err(_) => {
                    issues.push(error(path, "is not a valid duration (try \"30s\", \"800ms\")"));
                }
            }
        }

        if let Ok(poll) = humantime::parse_duration(&config.effects.poll_interval)
            && poll < std::time::Duration::from_millis(200)
            && !poll.is_zero()
        {
            issues.push(warning(
                "effects.poll_interval",
                "very short poll interval will hammer the backend",
            ));
        }
    }

    fn check_topology(config: &SessionConfig, issues: &mut Vec<ValidationIssue>) {
        let mut seen = HashSet::new();
        for (index, device) in config.topology.devices.iter().enumerate() {
            if device.id.as_str().trim().is_empty() {
                issues.push(error(
                    &format!("topology.devices[{index}].id"),
                    "must not be empty",
                ));
            }
            if !seen.insert(device.id.clone()) {
                issues.push(error(
                    &format!("topology.devices[{index}].id"),
                    "duplicate device id",
                ));
            }
        }

        for (index, connection) in config.topology.connections.iter().enumerate() {
            let path = format!("topology.connections[{index}]");
            if connection.a == connection.b {
                issues.push(error(&path, "self-loop connection"));
                continue;
            }
            for endpoint in [&connection.a, &connection.b] {
                let known = config
                    .topology
                    .devices
                    .iter()
                    .any(|device| device.id.as_str() == endpoint);
                if !known {
                    issues.push(error(&path, &format!("references unknown device '{endpoint}'")));
                }
            }
        }
    }
}

fn error(path: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
        severity: Severity::Error,
    }
}

fn warning(path: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
        severity: Severity::Warning,
    }
}
