//! coinscout - crypto analysis relay
//!
//! Validates JSON requests and relays them to an LLM or price-data API,
//! translating the answer (or any failure) back to the caller.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinscout::config::Config;
use coinscout::relay::run_server;

#[derive(Parser)]
#[command(name = "coinscout")]
#[command(about = "Crypto analysis relay for LLM and price-data APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file (environment only if it does not exist)
        #[arg(short, long, default_value = "coinscout.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration and show where each API key came from
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "coinscout.toml")]
        config: String,
    },

    /// Show configured upstream providers
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "coinscout.toml")]
        config: String,
    },
}

impl Commands {
    fn config_path(&self) -> &str {
        match self {
            Commands::Serve { config, .. }
            | Commands::Check { config }
            | Commands::Providers { config } => config,
        }
    }
}

fn init_tracing(level: &str) {
    let default_filter = format!("coinscout={level},tower_http={level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(cli.command.config_path());
    let level = loaded
        .as_ref()
        .map(|(config, _)| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    let (mut config, key_sources) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    for (kind, source) in &key_sources {
        tracing::info!(provider = %kind, source = %source, "Resolved API key");
    }

    match cli.command {
        Commands::Serve { listen, .. } => {
            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }
            run_server(config).await
        }

        Commands::Check { config: path } => {
            tracing::info!(config = %path, "Configuration is valid");
            for (kind, source) in &key_sources {
                println!("{:<8} key: {}", kind, source);
            }
            Ok(())
        }

        Commands::Providers { .. } => {
            for provider in config.providers.iter() {
                println!(
                    "{:<8} {:<52} {}",
                    provider.kind,
                    provider.url,
                    provider.model.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}
