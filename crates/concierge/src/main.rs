use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use concierge::cli::commands;
use concierge::config::{Config, EncoderBackend};

#[derive(Parser)]
#[command(name = "concierge")]
#[command(
  about = "Concierge - Booking Analytics\nSemantic booking lookup and precomputed statistics over a hotel reservation dataset"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
  #[command(flatten)]
  global: GlobalOptions,

  #[command(subcommand)]
  command: Command,
}

#[derive(Args)]
struct GlobalOptions {
  /// Encoder backend, overriding the configuration file
  #[arg(long, global = true, env = "CONCIERGE_ENCODER", value_enum)]
  encoder: Option<EncoderBackend>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,
}

/// Dataset override shared by the build commands
#[derive(Args)]
struct DatasetArg {
  /// Booking CSV to build from (defaults to the configured dataset)
  #[arg(long)]
  dataset: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
  /// Encode the dataset and write the aligned snapshot and vector index
  BuildIndex {
    #[command(flatten)]
    dataset: DatasetArg,
  },
  /// Precompute the analytics cache
  BuildAnalytics {
    #[command(flatten)]
    dataset: DatasetArg,
  },
  /// Build both the index and the analytics cache
  Build {
    #[command(flatten)]
    dataset: DatasetArg,
  },
  /// Find the booking closest to a question
  Ask {
    /// Question text (space-separated words are joined)
    #[arg(required = true)]
    question: Vec<String>,
  },
  /// Show one precomputed analytics view
  Analytics {
    /// revenue_trends, cancellation_rate, top_countries or lead_time_distribution
    analysis_type: String,
  },
  /// Show recently answered questions
  History {
    /// Maximum number of entries to show
    #[arg(short, long)]
    limit: Option<usize>,
    /// Print as a JSON array
    #[arg(long)]
    json: bool,
  },
  /// Print the effective configuration
  Config,
}

fn load_config(global: &GlobalOptions, dataset: Option<PathBuf>) -> Result<Config> {
  let mut config = Config::load()?;
  if let Some(backend) = global.encoder {
    config.encoder.backend = backend;
  }
  if let Some(dataset) = dataset {
    config.dataset = dataset;
  }
  Ok(config)
}

async fn handle(global: GlobalOptions, command: Command) -> Result<()> {
  match command {
    Command::BuildIndex { dataset } => {
      commands::build_index(&load_config(&global, dataset.dataset)?).await
    }
    Command::BuildAnalytics { dataset } => {
      commands::build_analytics(&load_config(&global, dataset.dataset)?)
    }
    Command::Build { dataset } => commands::build_all(&load_config(&global, dataset.dataset)?).await,
    Command::Ask { question } => {
      commands::ask(&load_config(&global, None)?, &question.join(" ")).await
    }
    Command::Analytics { analysis_type } => {
      commands::analytics(&load_config(&global, None)?, &analysis_type)
    }
    Command::History { limit, json } => {
      commands::history(&load_config(&global, None)?, limit, json).await
    }
    Command::Config => commands::show_config(&load_config(&global, None)?),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.global.verbose {
    EnvFilter::new("concierge=debug,ort=warn,info")
  } else {
    EnvFilter::new("concierge=warn,ort=error,warn")
  };
  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

  handle(cli.global, cli.command).await
}
