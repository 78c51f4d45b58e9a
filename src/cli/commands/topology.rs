//! `rangeview topology` — drive the topology lifecycle endpoint.

use crate::backend::{BackendClient, TopologyAction};
use crate::cli::args::{TopologyActionChoice, TopologyArgs};
use crate::error::RangeviewError;

/// Runs one lifecycle action and prints the per-device report.
///
/// # Errors
///
/// Returns a config error for an unloadable session file or a backend
/// error when the request fails.
pub async fn run(args: &TopologyArgs) -> Result<(), RangeviewError> {
    let config = super::load_config(args.config.as_deref())?;
    let backend = BackendClient::new(
        config.backend.base_url.clone(),
        config.backend.request_timeout(),
    );

    let action = match args.action {
        TopologyActionChoice::Start => TopologyAction::Start,
        TopologyActionChoice::Stop => TopologyAction::Stop,
        TopologyActionChoice::Status => TopologyAction::Status,
    };
    let template = args
        .template
        .as_deref()
        .or(config.topology.template.as_deref());

    let report = backend.topology(action, template).await?;
    if report.devices.is_empty() {
        println!("{action}: ok (no per-device report)");
    } else {
        println!("{action}:");
        for line in &report.devices {
            let state = if line.running { "running" } else { "failed" };
            println!("  {:<24} {state}", line.device.to_string());
        }
    }
    Ok(())
}
