//! eSIM reseller gateway.
//!
//! ```text
//!     Browser ──▶ /api/reseller, /api/topups ──┐
//!                                               ├──▶ ResellerClient ──▶ ResilientExecutor ──▶ Reseller API
//!     Payment processor ──▶ /api/webhooks ─────┘          │
//!                                                          ▼
//!                                                     OrderStore
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use esim_gateway::config::{self, GatewayConfig};
use esim_gateway::lifecycle::{build_server, shutdown_on_signal, Shutdown};
use esim_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "esim-gateway", version, about = "eSIM reseller gateway")]
struct Args {
    /// TOML config file. Defaults plus environment when omitted.
    #[arg(short, long, env = "ESIM_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

fn load(args: &Args) -> Result<GatewayConfig, config::ConfigError> {
    match &args.config {
        Some(path) => config::load_config(path),
        None => config::loader::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "esim-gateway starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        reseller = %config.reseller.base_url,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Address already validated.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = build_server(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
