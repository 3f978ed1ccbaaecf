use anyhow::{anyhow, Result};
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::analytics::{AnalyticsCacheBuilder, AnalyticsServer};
use crate::builder::IndexBuilder;
use crate::cli::display::{display_analytics, display_history, display_projection};
use crate::config::Config;
use crate::context::AppContext;
use crate::embedding::create_encoder;
use crate::history::QueryHistory;

/// Encode the dataset and write the aligned snapshot and index
pub async fn build_index(config: &Config) -> Result<()> {
  let started = Instant::now();
  let encoder = create_encoder(&config.encoder).await?;

  // Ctrl-C stops the build at the next batch boundary
  let cancel = Arc::new(AtomicBool::new(false));
  let flag = cancel.clone();
  let watcher = tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("Interrupt received, stopping after the current batch");
      flag.store(true, Ordering::Relaxed);
    }
  });

  let builder = IndexBuilder::new(encoder, config.encoder.batch_size).with_cancellation(cancel);
  let (dataset, snapshot, index) =
    (config.dataset_path(), config.snapshot_path(), config.index_path());
  let outcome = tokio::task::spawn_blocking(move || builder.run(&dataset, &snapshot, &index)).await;
  watcher.abort();

  let corpus = outcome.map_err(|e| anyhow!("index build task failed: {e}"))??;

  println!(
    "{} Indexed {} bookings with {} in {:.1?}",
    "✓".green(),
    corpus.len().to_string().cyan(),
    corpus.model_id().yellow(),
    started.elapsed()
  );
  println!("  snapshot: {}", config.snapshot_path().display());
  println!("  index:    {}", config.index_path().display());
  Ok(())
}

/// Compute every analytics view and write the cache
pub fn build_analytics(config: &Config) -> Result<()> {
  let cache = AnalyticsCacheBuilder::run(&config.dataset_path(), &config.analytics_path())?;

  println!(
    "{} Computed analytics over {} bookings",
    "✓".green(),
    cache.record_count.to_string().cyan()
  );
  println!("  cache: {}", config.analytics_path().display());
  Ok(())
}

pub async fn build_all(config: &Config) -> Result<()> {
  build_index(config).await?;
  build_analytics(config)
}

/// Answer one question from the persisted index and record it
pub async fn ask(config: &Config, question: &str) -> Result<()> {
  let context = Arc::new(AppContext::new(config.clone())?);
  context.load_resolver().await?;

  let projection = context.ask(question).await?;
  display_projection(&projection);
  Ok(())
}

pub fn analytics(config: &Config, analysis_type: &str) -> Result<()> {
  let server = AnalyticsServer::load(&config.analytics_path())?;
  let view = server.get(analysis_type)?;

  display_analytics(&view);
  Ok(())
}

pub async fn history(config: &Config, limit: Option<usize>, json: bool) -> Result<()> {
  let history = QueryHistory::open(config.history_path())?;

  if json {
    let exported = match limit {
      None => history.export_json().await?,
      Some(_) => serde_json::to_string_pretty(&history.recent(limit).await?)?,
    };
    println!("{exported}");
  } else {
    display_history(&history.recent(limit).await?);
  }
  Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
  println!("{} {}", "root:".dimmed(), config.root_dir().display());
  println!("{}", serde_json::to_string_pretty(config)?);
  Ok(())
}
