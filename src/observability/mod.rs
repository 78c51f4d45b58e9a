//! Observability
//!
//! Structured logging setup and metric recording helpers.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
