//! SmartFlow mock-server binary.
//!
//! Serves the in-memory reference API, seeded with one citizen and one
//! officer account, for local development against the `smartflow` CLI.
//! Reads `mock-server.toml` (or `--config`) and `SMARTFLOW_`-prefixed
//! environment variables.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use smartflow_api::Backend;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "SmartFlow reference API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "mock-server.toml")]
  config: PathBuf,

  /// Score every submission with the fixed demo table.
  #[arg(long)]
  auto_assess: bool,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:        String,
  #[serde(default = "default_port")]
  port:        u16,
  #[serde(default)]
  auto_assess: bool,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 5000 }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SMARTFLOW"))
    .build()
    .context("failed to read config file")?;
  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let backend = Backend::new();
  seed(&backend)?;
  backend.set_auto_assess(cli.auto_assess || server_cfg.auto_assess);

  let app = smartflow_api::app(Arc::new(backend));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Demo accounts. Both use the password `password123`.
fn seed(backend: &Backend) -> anyhow::Result<()> {
  backend
    .add_citizen("123456789012", "Rahul Sharma", "password123")
    .context("seeding citizen")?;
  backend
    .add_officer("OFF001", "officer1@uidai.gov.in", "Rajesh Kumar", "password123")
    .context("seeding officer")?;
  tracing::info!("seeded citizen 123456789012 and officer OFF001");
  Ok(())
}
