//! Orderhub Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings come from `--config PATH`, else the first of
//! `~/.config/orderhub/config.toml`, `/etc/orderhub/config.toml` and
//! `./config.toml` that exists. `ORDERHUB_*` environment variables override
//! the file and `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use orderhub::api::{serve, AppState};
use orderhub::config::{generate_default_config, Config, LoggingConfig};
use orderhub::orders::OrderHandler;
use orderhub::websocket::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "orderhub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time shared order board over WebSocket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print or write a default configuration file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            let mut config = match &cli.config {
                Some(path) => Config::load_with_env(path)?,
                None => Config::load_default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_logging(&config.logging);
            run(config).await?;
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("creating {:?}", parent))?;
                    }
                    std::fs::write(&path, &config)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting orderhub v{}", env!("CARGO_PKG_VERSION"));

    let hub_config = config.hub_config();
    tracing::info!(
        max_connections = hub_config.max_connections,
        outbound_capacity = hub_config.connection.outbound_capacity,
        "Connection registry configured"
    );

    let api_config = config.api_config();
    tracing::info!("Web root: {:?}", api_config.web_root);

    let registry = Registry::new(Arc::new(OrderHandler::new()), hub_config);
    let state = AppState::new(registry, api_config);

    serve(state).await.context("server failed")?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("orderhub={},tower_http=info", logging.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
