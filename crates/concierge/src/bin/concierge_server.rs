//! Concierge REST Server
//!
//! Serves booking questions and precomputed analytics over HTTP. The index,
//! snapshot and analytics cache must have been built with `concierge build`.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use concierge::config::{Config, EncoderBackend};
use concierge::context::AppContext;
use concierge::server::startup::start_server;

#[derive(Parser)]
#[command(name = "concierge_server")]
#[command(about = "Concierge REST API Server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
  /// Server bind address (defaults to the configured address)
  #[arg(long)]
  bind: Option<SocketAddr>,

  /// Encoder backend, overriding the configuration file
  #[arg(long, env = "CONCIERGE_ENCODER", value_enum)]
  encoder: Option<EncoderBackend>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let filter = if args.verbose {
    EnvFilter::new("info,ort=warn,tower_http=debug")
  } else {
    EnvFilter::new("concierge=info,ort=error,warn")
  };

  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  let mut config = Config::load()?;
  if let Some(backend) = args.encoder {
    config.encoder.backend = backend;
  }
  let bind = match args.bind {
    Some(addr) => addr,
    None => config.bind.parse()?,
  };

  info!("Starting Concierge REST Server v{}", env!("CARGO_PKG_VERSION"));
  info!("Data root: {}", config.root_dir().display());

  let context = Arc::new(AppContext::new(config)?);
  start_server(bind, context).await
}
