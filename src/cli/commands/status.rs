//! `rangeview status` — query the attack agent.

use crate::backend::BackendClient;
use crate::cli::args::StatusArgs;
use crate::error::RangeviewError;

/// Prints the attack agent's status envelope.
///
/// # Errors
///
/// Returns a config error for an unloadable session file or a backend
/// error when the request fails.
pub async fn run(args: &StatusArgs) -> Result<(), RangeviewError> {
    let config = super::load_config(args.config.as_deref())?;
    let backend = BackendClient::new(
        config.backend.base_url.clone(),
        config.backend.request_timeout(),
    );

    let status = backend.agent_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
