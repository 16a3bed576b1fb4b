//! CloudGate CLI - runs the storage gateway.
//!
//! `serve` starts the HTTP gateway; `init-config` writes a starting
//! configuration file.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cloudgate_common::{ProviderTag, Secret};
use cloudgate_gateway::{AccountService, Gateway, GatewayConfig, StoreConfig, TokenIssuer};
use cloudgate_storage::{create_default_registry, CredentialRecord};

/// Environment variable overriding the token secret.
const TOKEN_SECRET_ENV: &str = "CLOUDGATE_TOKEN_SECRET";

#[derive(Parser)]
#[command(name = "cloudgate")]
#[command(about = "CloudGate - Multi-tenant cloud storage gateway")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway.
    Serve(ServeArgs),

    /// Write a configuration file with default values.
    InitConfig {
        /// Destination file.
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },

    /// List supported providers and the fields `/add` expects for each.
    Providers,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Default)]
struct ServeArgs {
    /// Configuration file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5000.
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database path.
    #[arg(short, long, conflicts_with = "memory")]
    database: Option<PathBuf>,

    /// Keep users and credentials in memory only.
    #[arg(long)]
    memory: bool,

    /// Token signing secret.
    #[arg(long)]
    token_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::InitConfig { output, force } => cmd_init_config(&output, force),
        Commands::Providers => {
            cmd_providers();
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cloudgate", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Resolve the effective configuration: file, then environment, then flags.
fn resolve_config(args: &ServeArgs, env_secret: Option<String>) -> Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    if let Some(secret) = env_secret.filter(|s| !s.trim().is_empty()) {
        config.token.secret = Secret::new(secret);
    }
    if let Some(secret) = &args.token_secret {
        config.token.secret = Secret::new(secret.as_str());
    }
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if let Some(path) = &args.database {
        config.store = StoreConfig::Sqlite { path: path.clone() };
    }
    if args.memory {
        config.store = StoreConfig::Memory;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Random secret for runs without a configured one.
fn ephemeral_secret() -> Secret {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    Secret::new(key.iter().map(|b| format!("{:02x}", b)).collect::<String>())
}

async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let config = resolve_config(&args, std::env::var(TOKEN_SECRET_ENV).ok())?;

    let secret = if config.token.secret.is_blank() {
        warn!("No token secret configured; tokens will not survive a restart");
        ephemeral_secret()
    } else {
        config.token.secret.clone()
    };
    let tokens = TokenIssuer::new(secret, chrono::Duration::minutes(config.token.ttl_minutes))
        .context("Failed to set up token issuer")?;

    let (credentials, users) = config.store.open().context("Failed to open store")?;
    let registry = create_default_registry();
    info!(providers = ?registry.providers(), store = ?config.store, "Gateway configured");

    let state = cloudgate_http::AppState::new(
        Gateway::new(credentials, registry),
        AccountService::new(users, tokens),
    );

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    cloudgate_http::serve(listener, cloudgate_http::router(state, config.body_limit_bytes))
        .await
        .context("Server failed")?;

    info!("Gateway stopped");
    Ok(())
}

fn cmd_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = GatewayConfig::default();
    config
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Configuration written to {}", output.display());
    println!("  Bind: {}", config.bind);
    println!("  Store: {:?}", config.store);
    println!("  Set a token secret before exposing the gateway.");
    Ok(())
}

fn cmd_providers() {
    for tag in ProviderTag::ALL {
        println!(
            "{:<4} {} (links valid {}s)",
            tag.as_str(),
            CredentialRecord::required_fields(tag).join(", "),
            tag.link_ttl().as_secs()
        );
    }
}
