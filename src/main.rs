use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use devproxy::config::Config;
use devproxy::integrations::IntegrationRegistry;
use devproxy::proxy::DevServer;

#[derive(Parser)]
#[command(name = "devproxy")]
#[command(about = "Development server that forwards API prefixes to a backend")]
struct Args {
    #[arg(short, long, default_value = "devproxy.toml")]
    config: String,

    /// Overrides server.bind from the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("devproxy={},hyper=info", level))
        .init();

    info!("Starting devproxy");

    let config = Config::from_file_with_env(&args.config).await?;
    info!("Loaded configuration from {}", args.config);

    let mut server = DevServer::new(config, &IntegrationRegistry::with_builtin())?;
    if let Some(bind) = args.bind {
        server = server.with_bind_addr(bind);
    }

    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        warn!("Received CTRL+C, shutting down gracefully...");
    };

    server.run_until(shutdown_signal).await?;

    info!("devproxy shutdown complete");
    Ok(())
}
