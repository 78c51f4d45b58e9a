//! Session configuration
//!
//! Loading and validation of the YAML session file: backend endpoints,
//! push channel, topology layout, and effect timing.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigLoader;
pub use schema::{
    AttackConfig, BackendConfig, ConnectionEntry, EffectsConfig, PushConfig, SessionConfig,
    TopologyConfig,
};
pub use validation::Validator;
