//! delay-chain: a three-service HTTP chain for exercising distributed tracing.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────┐  GET /delay   ┌───────────────────────────┐  W × GET /rng   ┌──────────┐
//!   │ caller │──────────────▶│        middleman          │────────────────▶│ receiver │
//!   │ ticker │◀──────────────│ fan-out + mean + local    │◀────────────────│  random  │
//!   └────────┘ {"delay": n}  │ simulated delay           │ {"delay": n}    │  delay   │
//!                            └───────────────────────────┘                 └──────────┘
//!
//!   traceparent and x-request-id flow left to right on every hop; every
//!   service exports its spans over OTLP when an endpoint is configured.
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use delay_chain::caller::Caller;
use delay_chain::config::{load_or_default, ChainConfig};
use delay_chain::observability::Telemetry;
use delay_chain::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "delay-chain")]
#[command(about = "Traced HTTP delay chain: caller, middleman and receiver", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "DELAY_CHAIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Role,
}

#[derive(Subcommand, Clone, Copy)]
enum Role {
    /// Fan-out aggregator on /delay
    Middleman,
    /// Random delay source on /rng
    Receiver,
    /// Periodic load driver against the middleman
    Caller,
}

impl Role {
    fn service(self) -> &'static str {
        match self {
            Role::Middleman => "middleman",
            Role::Receiver => "receiver",
            Role::Caller => "caller",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    let telemetry = Telemetry::init(cli.command.service(), &config.observability)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let result = run(cli.command, &config, &shutdown).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Service exited with error");
    }

    if let Err(e) = telemetry.shutdown() {
        tracing::error!(error = %e, "Telemetry shutdown failed");
    }
    result
}

async fn run(
    role: Role,
    config: &ChainConfig,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn std::error::Error>> {
    match role {
        Role::Middleman => {
            let m = &config.middleman;
            tracing::info!(
                listen = %m.bind_address,
                downstream_url = %m.downstream_url,
                workers = m.workers,
                max_latency_ms = m.max_latency_ms,
                "Configuration loaded"
            );
            let listener = TcpListener::bind(&m.bind_address).await?;
            HttpServer::middleman(m)?
                .run(listener, shutdown.subscribe())
                .await?;
        }
        Role::Receiver => {
            let r = &config.receiver;
            tracing::info!(
                listen = %r.bind_address,
                max_delay_ms = r.max_delay_ms,
                failure_one_in = r.failure_one_in,
                "Configuration loaded"
            );
            let listener = TcpListener::bind(&r.bind_address).await?;
            HttpServer::receiver(r)
                .run(listener, shutdown.subscribe())
                .await?;
        }
        Role::Caller => {
            Caller::new(&config.caller)?
                .run(shutdown.subscribe())
                .await;
        }
    }
    Ok(())
}
