//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod run;
pub mod status;
pub mod topology;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, SessionConfig};
use crate::error::RangeviewError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), RangeviewError> {
    match cli.command {
        Commands::Run(args) => run::run(&args).await,
        Commands::Topology(args) => topology::run(&args).await,
        Commands::Status(args) => status::run(&args).await,
    }
}

/// Loads the session config from an optional path, falling back to
/// defaults (plus env overrides).
pub(crate) fn load_config(
    path: Option<&std::path::Path>,
) -> Result<SessionConfig, RangeviewError> {
    match path {
        Some(path) => Ok(ConfigLoader::load(path)?),
        None => Ok(ConfigLoader::defaults()),
    }
}
