//! esmelink command-line entrypoint.
//!
//! Runs a client declared in a JSON configuration file against its SMSC.
//! Exit codes: 0 on a clean shutdown, 2 on a configuration error, 1 on an
//! unhandled runtime error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use esmelink::{Client, ClientConfig};

/// An SMPP v3.4 client: binds to an SMSC as a transceiver and relays
/// broker-fed messages.
#[derive(Parser, Debug)]
#[command(name = "esmelink", version, about)]
struct Opt {
    /// Path to a JSON declaration of the configured client instance
    #[arg(long)]
    client: PathBuf,

    /// Log level filter (e.g. info, debug, esmelink=trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: &PathBuf) -> anyhow::Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading client declaration {}", path.display()))?;
    let config: ClientConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing client declaration {}", path.display()))?;
    Ok(config)
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let client = Arc::new(Client::new(config));

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!(event = "cli.signal", "shutdown signal received");
    client.stop();

    runner
        .await
        .context("client task panicked")?
        .context("client terminated with an error")?;
    Ok(())
}

fn main() -> ExitCode {
    let opt = Opt::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&opt.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match load_config(&opt.client) {
        Ok(config) => config,
        Err(e) => {
            error!(event = "cli.config", error = format_args!("{e:#}"), "configuration error");
            return ExitCode::from(2);
        }
    };

    info!(
        event = "cli.start",
        client_id = %config.client_id,
        smsc_host = %config.smsc_host,
        "starting esmelink"
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(event = "cli.runtime", error = %e, "could not start runtime");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => {
            info!(event = "cli.stop", "clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(event = "cli.error", error = format_args!("{e:#}"), "runtime error");
            ExitCode::from(1)
        }
    }
}
