//! Error types for `rangeview`
//!
//! Domain errors are small thiserror enums; the top-level
//! [`RangeviewError`] aggregates them and maps each to a CLI exit code.
//! Registry lookups never appear here — an unknown task id is reported
//! as `None`/`false` by the registry, not as an error.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `rangeview` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Backend or push-channel error (connection failed, timeout, non-2xx)
    pub const BACKEND_ERROR: i32 = 4;

    /// Attack task reached the failed state
    pub const TASK_FAILED: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `rangeview` operations.
///
/// Aggregates all domain-specific errors and provides a unified
/// interface for error handling and exit code mapping.
#[derive(Debug, Error)]
pub enum RangeviewError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Topology graph mutation error
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Attack backend request error
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Push channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Attack task ended in the failed state
    #[error("attack task failed: {0}")]
    TaskFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RangeviewError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Backend(_) | Self::Channel(_) => ExitCode::BACKEND_ERROR,
            Self::TaskFailed(_) => ExitCode::TASK_FAILED,
            Self::Topology(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Topology Errors
// ============================================================================

/// Topology graph mutation errors.
///
/// Returned to the caller and never swallowed; read paths
/// (`reachable`, `neighbors`, `device`) are infallible by design.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A device with this id already exists
    #[error("duplicate device id: {0}")]
    DuplicateId(String),

    /// Connection endpoints are invalid (self-loop or unknown device)
    #[error("invalid connection endpoints: {a} -> {b}: {reason}")]
    InvalidEndpoint {
        /// First endpoint id as given
        a: String,
        /// Second endpoint id as given
        b: String,
        /// Why the pair was rejected
        reason: String,
    },
}

// ============================================================================
// Backend Errors
// ============================================================================

/// Attack backend and topology lifecycle API errors.
///
/// Every variant resolves to `fail_task` plus a log entry at the
/// orchestrator — a task is never left pending on a backend error.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request could not be sent or the connection dropped
    #[error("backend request failed: {0}")]
    Request(String),

    /// Request exceeded the configured timeout
    #[error("backend request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Backend answered with a non-2xx status; body text is the failure reason
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// Response body could not be decoded
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Push Channel Errors
// ============================================================================

/// Push channel connection errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Initial connection failed
    #[error("push channel connection failed: {0}")]
    ConnectionFailed(String),

    /// Reconnect budget exhausted
    #[error("push channel gave up after {attempts} reconnect attempts")]
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Channel closed by the remote end
    #[error("push channel closed: {0}")]
    Closed(String),
}

// ============================================================================
// Effect Errors
// ============================================================================

/// Effect producer errors.
///
/// Isolated per sequence: the scheduler catches and logs these, and a
/// failing producer never disturbs sibling sequences or the orchestrator.
#[derive(Debug, Error)]
pub enum EffectError {
    /// Producer reported a failure
    #[error("effect producer failed: {0}")]
    Producer(String),

    /// Producer referenced a primitive the renderer no longer holds
    #[error("stale primitive handle: {0}")]
    StaleHandle(String),
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g. `backend.base_url`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `rangeview` operations.
pub type Result<T> = std::result::Result<T, RangeviewError>;

// ============================================================================
// Tests
// ============================================================================
