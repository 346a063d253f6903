//! # CLI Interface
//!
//! Defines the command-line argument structure for `usdx-relayer` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use usdx_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT, DEFAULT_YIELD_APR_BPS};

use crate::logging::LogFormat;

/// USDX position relayer.
///
/// Runs an in-process hub/spoke pair of USDX domains and relays between
/// them: hub position snapshots to the spoke minter, and bridge transfer
/// completions in both directions. Serves an HTTP API for driving the
/// domains and Prometheus metrics for watching the relay.
#[derive(Parser, Debug)]
#[command(
    name = "usdx-relayer",
    about = "USDX position relayer",
    version,
    propagate_version = true
)]
pub struct RelayerCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the relayer binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the simnet domains and the relay loops.
    Run(RunArgs),
    /// Query the status of a running relayer via its HTTP API.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory for the durable relay checkpoints.
    ///
    /// Created on first run if it does not exist. Deleting it makes the
    /// relayer reprocess the full event logs on next start — harmless,
    /// since every relayed operation is idempotent, but noisy.
    #[arg(long, short = 'd', env = "USDX_DATA_DIR", default_value = "./usdx-relayer-data")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "USDX_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "USDX_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Interval between event-log polls, in milliseconds.
    #[arg(long, env = "USDX_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Heartbeat interval, in seconds.
    #[arg(long, env = "USDX_HEARTBEAT_SECS", default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Yield venue APR in basis points (500 = 5%).
    #[arg(long, env = "USDX_APR_BPS", default_value_t = DEFAULT_YIELD_APR_BPS)]
    pub apr_bps: u32,

    /// Hub chain id.
    #[arg(long, env = "USDX_HUB_CHAIN_ID", default_value_t = 1)]
    pub hub_chain_id: u64,

    /// Spoke chain id.
    #[arg(long, env = "USDX_SPOKE_CHAIN_ID", default_value_t = 137)]
    pub spoke_chain_id: u64,

    /// Log output format.
    #[arg(long, env = "USDX_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// HTTP API endpoint of the running relayer.
    #[arg(long, default_value = "http://127.0.0.1:8973")]
    pub api_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        RelayerCli::command().debug_assert();
    }

    #[test]
    fn run_defaults_are_usable() {
        let cli = RelayerCli::parse_from(["usdx-relayer", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.api_port, DEFAULT_API_PORT);
                assert_eq!(args.hub_chain_id, 1);
                assert_eq!(args.spoke_chain_id, 137);
                assert!(args.poll_interval_ms > 0);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }
}
