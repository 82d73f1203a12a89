//! fieldwatch: watch live field telemetry
//!
//! Usage:
//!   fieldwatch watch [--config fieldwatch.toml] [--tui]  → poll every configured panel
//!   fieldwatch send "hello" [--resonance 0.8]            → one message to the action endpoint
//!   fieldwatch dump-config                               → print the default config as TOML

use clap::{Parser, Subcommand};
use fieldwatch::logging::{init_tracing, LogOptions};
use fieldwatch::{dashboard, watch, WatchConfig};
use fieldwatch_client::{ActionClient, ConnectionManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "fieldwatch",
    about = "Live telemetry panels for a field backend",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every configured panel and show its status
    Watch {
        /// Path to the config file (TOML)
        #[arg(short, long, default_value = "fieldwatch.toml")]
        config: PathBuf,
        /// Full-screen dashboard instead of status lines
        #[arg(long, default_value_t = false)]
        tui: bool,
        /// Seconds between status lines
        #[arg(long, default_value_t = 1)]
        refresh_secs: u64,
    },
    /// Send one message through the action endpoint
    Send {
        message: String,
        /// Override the configured action endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// User resonance in 0..=1
        #[arg(long)]
        resonance: Option<f64>,
        #[arg(short, long, default_value = "fieldwatch.toml")]
        config: PathBuf,
    },
    /// Print the default configuration as TOML
    DumpConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let quiet = matches!(cli.command, Commands::Watch { tui: true, .. });
    let _guard = init_tracing(LogOptions {
        json: cli.log_json,
        file: cli.log_file.as_deref(),
        quiet,
    })?;

    match cli.command {
        Commands::Watch {
            config,
            tui,
            refresh_secs,
        } => {
            let config = WatchConfig::load(&config);
            config.validate()?;
            let manager = Arc::new(ConnectionManager::new());
            let tables = watch::mount(&config, &manager).await?;

            let result = if tui {
                dashboard::run_dashboard(manager.clone(), tables).await
            } else {
                watch::run_plain(&manager, &tables, Duration::from_secs(refresh_secs.max(1))).await
            };
            manager.shutdown().await;
            result?;
        }

        Commands::Send {
            message,
            endpoint,
            resonance,
            config,
        } => {
            let config = WatchConfig::load(&config);
            let endpoint = endpoint.unwrap_or_else(|| config.action.endpoint.clone());
            let client = ActionClient::new(
                endpoint,
                config.action.user_id.clone(),
                Duration::from_millis(config.action.timeout_ms),
            )?;
            let reply = client.send(&message, resonance).await?;
            println!("{}", reply.response);
            if let Some(stability) = reply.stability {
                let balance = fieldwatch_core::Balance::new(stability, reply.exploration.unwrap_or(1.0 - stability));
                println!("balance {} ({})", balance.ratio_label(), balance.status());
            }
        }

        Commands::DumpConfig => {
            print!("{}", WatchConfig::default().to_toml());
        }
    }

    Ok(())
}
