//! Main application entry point for the goban server.
//!
//! Provides the CLI, configuration loading, logging setup and the server
//! lifecycle up to a graceful shutdown.

mod cli;
mod config;
mod signals;

use anyhow::{Context, Result};
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use game_server::{GameServer, MemoryStore};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system. `RUST_LOG` takes precedence over the configured level.
fn setup_logging(config: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("building log filter")?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", config.level);
    Ok(())
}

/// The configured server plus everything needed to run it.
pub struct Application {
    config: AppConfig,
    server: Arc<GameServer>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(secret) = args.shared_secret {
            config.protocol.shared_secret = Some(secret);
        }

        config
            .validate()
            .context("Configuration validation failed")?;
        setup_logging(&config.logging)?;

        let version = env!("CARGO_PKG_VERSION");
        info!("⚫⚪ goban session server v{}", version);
        info!("📂 Config: {}", args.config_path.display());

        let store = Arc::new(MemoryStore::with_users(config.users.iter().cloned()));
        let server = Arc::new(GameServer::new(config.to_server_config()?, store));

        Ok(Self { config, server })
    }

    /// Runs the server until SIGINT/SIGTERM, then stops accepting connections.
    pub async fn run(self) -> Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Main time: {}s", self.config.game.main_time_secs);
        info!("  🧑 Seeded users: {}", self.config.users.len());

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.start().await })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");
        let signal = tokio::select! {
            signal = signals::wait_for_shutdown() => Some(signal),
            finished = &mut server_handle => {
                if let Err(e) = finished.context("server task panicked")? {
                    error!("❌ Server error: {}", e);
                    return Err(e.into());
                }
                None
            }
        };

        if let Some(signal) = signal {
            signal.context("installing signal handlers")?;
            info!("🛑 Shutdown signal received, initiating graceful shutdown...");
            self.server.shutdown().await?;
            server_handle.await.context("server task panicked")??;
        }

        info!("👋 goban shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = Application::new(args).await?;
    app.run().await
}
