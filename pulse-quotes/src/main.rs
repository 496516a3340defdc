//! Pulse Quotes - A-share quote resolver and watchlist monitor.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pulse_common::config::Config;
use pulse_common::logging::init_logging;
use pulse_quotes::QuoteService;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

/// Resolve A-share quotes from the eastmoney snapshot with an HTTP fallback.
#[derive(Parser, Debug)]
#[command(name = "pulse-quotes")]
#[command(version)]
#[command(about = "Real-time A-share quotes with snapshot cache and HTTP fallback", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.pulse/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one or more tickers and print them as JSON lines
    Resolve {
        /// Tickers such as 600133, sz000977, 600588.SH
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Poll the watchlist during trading hours until Ctrl-C
    Watch {
        /// Override the configured watchlist (repeatable)
        #[arg(long = "symbol")]
        symbols: Vec<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    info!("Pulse Quotes v{}", env!("CARGO_PKG_VERSION"));

    let service = QuoteService::new(config);

    match cli.command {
        Commands::Resolve { symbols } => {
            let mut missing = 0usize;
            for symbol in &symbols {
                match service.resolve(symbol).await {
                    Some(quote) => println!("{}", serde_json::to_string(&quote)?),
                    None => {
                        warn!(symbol = %symbol, "No quote available");
                        missing += 1;
                    }
                }
            }
            if missing == symbols.len() {
                bail!("no quote could be resolved");
            }
            Ok(())
        }
        Commands::Watch { symbols } => {
            let mut watcher = service.watcher()?;
            if !symbols.is_empty() {
                watcher = watcher.with_symbols(symbols);
            }

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });

            watcher.run(shutdown_rx).await
        }
    }
}
