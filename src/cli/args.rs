//! CLI argument definitions
//!
//! All Clap derive structs for `rangeview` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Kill-chain attack visualization engine for emulated network ranges.
#[derive(Parser, Debug)]
#[command(name = "rangeview", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "RANGEVIEW_LOG_FORMAT")]
    pub log_format: LogFormatChoice,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "RANGEVIEW_COLOR")]
    pub color: ColorChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an attack session: provision, submit, drive to terminal.
    Run(RunArgs),

    /// Manage the emulated topology lifecycle.
    Topology(TopologyArgs),

    /// Query the attack agent's status.
    Status(StatusArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML session configuration file.
    #[arg(short, long, env = "RANGEVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Attack type forwarded to the backend (defaults from config).
    #[arg(long)]
    pub attack_type: Option<String>,

    /// Attacking device id on the diagram.
    #[arg(long)]
    pub attacker: Option<String>,

    /// Target device id on the diagram.
    #[arg(long)]
    pub target: Option<String>,

    /// Target host URL the backend should aim at.
    #[arg(long)]
    pub target_host: Option<String>,

    /// Run a social-engineering attack instead of a full kill chain.
    #[arg(long)]
    pub social: bool,

    /// Victim display name for social-engineering lures.
    #[arg(long, requires = "social")]
    pub victim_name: Option<String>,

    /// Skip topology provisioning (use when the range is already up).
    #[arg(long)]
    pub no_provision: bool,
}

/// Arguments for `topology`.
#[derive(Args, Debug)]
pub struct TopologyArgs {
    /// Lifecycle action to perform.
    pub action: TopologyActionChoice,

    /// Path to the YAML session configuration file.
    #[arg(short, long, env = "RANGEVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template name (defaults from config).
    #[arg(long)]
    pub template: Option<String>,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the YAML session configuration file.
    #[arg(short, long, env = "RANGEVIEW_CONFIG")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Log format choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatChoice {
    /// Human-readable output.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
}

/// Topology lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopologyActionChoice {
    /// Provision the emulated environment.
    Start,
    /// Tear it down.
    Stop,
    /// Query per-device state.
    Status,
}

// ============================================================================
// Tests
// ============================================================================
