// Copyright (c) 2026 USDX Protocol Contributors. MIT License.
// See LICENSE for details.

//! # USDX Relayer
//!
//! Entry point for the `usdx-relayer` binary. Parses CLI arguments,
//! initializes logging and metrics, spins up the hub and spoke domain
//! actors, starts the relay loops, and serves the HTTP API and the
//! Prometheus metrics endpoint.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the simnet domains and relay between them
//! - `status`  — query a running relayer's status endpoint
//! - `version` — print build version information

mod api;
mod checkpoint;
mod cli;
mod logging;
mod metrics;
mod relay;
mod simnet;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;

use usdx_contracts::{HubDomain, SpokeDomain};
use usdx_protocol::config::RELAYER_ADDRESS;
use usdx_protocol::ids::ChainId;

use checkpoint::CheckpointStore;
use cli::{Commands, RelayerCli};
use metrics::RelayerMetrics;
use simnet::{spawn_hub, spawn_spoke};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RelayerCli::parse();

    match cli.command {
        Commands::Run(args) => run_relayer(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full relayer: domain actors, relay loops, API server, and
/// metrics endpoint. Returns (non-zero exit) only on an unrecoverable
/// failure or after a clean shutdown signal.
async fn run_relayer(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "usdx_relayer=info,usdx_contracts=info,tower_http=info",
        args.log_format,
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        hub_chain_id = args.hub_chain_id,
        spoke_chain_id = args.spoke_chain_id,
        data_dir = %args.data_dir.display(),
        "starting usdx-relayer"
    );

    // --- Durable checkpoints ---
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;
    let checkpoints = CheckpointStore::open(args.data_dir.join("checkpoints"))
        .context("failed to open checkpoint store")?;

    // --- Metrics ---
    let node_metrics = Arc::new(RelayerMetrics::new());

    // --- Domains ---
    let hub_chain = ChainId(args.hub_chain_id);
    let spoke_chain = ChainId(args.spoke_chain_id);
    let hub = spawn_hub(HubDomain::genesis(
        hub_chain,
        spoke_chain,
        RELAYER_ADDRESS,
        args.apr_bps,
        Utc::now(),
    ));
    let spoke = spawn_spoke(SpokeDomain::genesis(spoke_chain, hub_chain, RELAYER_ADDRESS));
    tracing::info!(hub = %hub_chain, spoke = %spoke_chain, "domains at genesis");

    // --- Relay loops ---
    let poll = Duration::from_millis(args.poll_interval_ms);
    let mut relays: JoinSet<Result<()>> = JoinSet::new();
    relays.spawn(relay::position_sync_loop(
        hub.clone(),
        spoke.clone(),
        checkpoints.clone(),
        Arc::clone(&node_metrics),
        poll,
    ));
    relays.spawn(relay::bridge_completion_loop(
        hub.clone(),
        spoke.clone(),
        checkpoints.clone(),
        Arc::clone(&node_metrics),
        poll,
    ));
    relays.spawn(relay::bridge_completion_loop(
        spoke.clone(),
        hub.clone(),
        checkpoints.clone(),
        Arc::clone(&node_metrics),
        poll,
    ));
    relays.spawn(relay::heartbeat_loop(
        hub.clone(),
        spoke.clone(),
        Arc::clone(&node_metrics),
        Duration::from_secs(args.heartbeat_secs),
    ));

    // --- API server ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            usdx_protocol::config::PROTOCOL_VERSION,
        ),
        started_at: Instant::now(),
        hub,
        spoke,
    };
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve until a failure or a signal ---
    let outcome = tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            res.map_err(|e| anyhow!("API server error: {e}"))
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            res.map_err(|e| anyhow!("metrics server error: {e}"))
        }
        Some(res) = relays.join_next() => {
            match res {
                Ok(Ok(())) => Err(anyhow!("relay loop exited unexpectedly")),
                Ok(Err(e)) => Err(e.context("unrecoverable relay failure")),
                Err(join_err) => Err(anyhow!("relay task panicked: {join_err}")),
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping");
            Ok(())
        }
    };

    relays.abort_all();
    match outcome {
        Ok(()) => {
            tracing::info!("usdx-relayer stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "usdx-relayer terminating");
            Err(e)
        }
    }
}

/// Queries a running relayer's status endpoint and prints the body.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP/1.1 GET over a raw TCP stream — just enough for the
/// `status` subcommand without pulling an HTTP client into the binary.
async fn http_get(url: &str) -> Result<String> {
    let (host, port, path) = split_url(url)?;

    let mut stream = tokio::net::TcpStream::connect((host.as_str(), port))
        .await
        .with_context(|| format!("failed to connect to {host}:{port}"))?;

    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    Ok(response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_else(|| response.to_string()))
}

/// Splits `http://host[:port]/path` into its pieces. Port defaults to 80.
fn split_url(url: &str) -> Result<(String, u16, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| anyhow!("only http:// URLs are supported, got {url}"))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].to_string()),
        None => (rest, "/".to_string()),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (
            h.to_string(),
            p.parse::<u16>().with_context(|| format!("bad port in {url}"))?,
        ),
        None => (authority.to_string(), 80),
    };

    Ok((host, port, path))
}

/// Prints version information to stdout.
fn print_version() {
    println!("usdx-relayer {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", usdx_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
