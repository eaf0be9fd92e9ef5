//! Broker auth webhook server
//!
//! Loads configuration, seeds the credential store and serves the
//! `auth_on_register` / `auth_on_publish` / `auth_on_subscribe` callbacks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vmq_authhook::config::Config;
use vmq_authhook::hooks::HookApi;
use vmq_authhook::metrics::HookMetrics;
use vmq_authhook::security::auth::password::hash_password;
use vmq_authhook::security::{CredentialSnapshot, CredentialStore, InMemoryCredentialStore, SecurityManager};

const DEFAULT_CONFIG_PATH: &str = "config/authhook.toml";

#[derive(Parser)]
#[command(name = "vmq-authhook")]
#[command(about = "Authentication and topic authorization webhooks for an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the listen address from the configuration
    #[arg(long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Argon2 hash of a device password for provisioning
    HashPassword {
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::HashPassword { password }) = &cli.command {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    config.validate().context("invalid configuration")?;

    // RUST_LOG takes precedence over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .context("invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting broker auth webhook");
    info!("Configuration: {}", cli.config);

    let store = build_store(&config)?;
    let metrics = HookMetrics::new().context("failed to register metrics")?;
    let manager = SecurityManager::from_config(&config, store, metrics)
        .context("failed to build security manager")?;

    let api = HookApi::new(Arc::new(manager), config.server.socket_addr()?);
    api.start().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Read the config file, falling back to defaults only when the default path is absent
fn load_config(path: &str) -> Result<Config> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(Config::default());
    }

    Config::from_file(path).with_context(|| format!("failed to load configuration from {}", path))
}

fn build_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let store = match &config.store.snapshot_path {
        Some(path) => {
            let snapshot = CredentialSnapshot::from_file(path)
                .with_context(|| format!("failed to load credential snapshot {}", path.display()))?;
            InMemoryCredentialStore::from_snapshot(snapshot)
        }
        None => {
            warn!("No store.snapshot_path configured, starting with an empty credential store");
            InMemoryCredentialStore::new()
        }
    };

    Ok(Arc::new(store))
}
