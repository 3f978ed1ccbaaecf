//! Application context shared by every request.
//!
//! Each read-only resource is settled exactly once, when startup loading
//! finishes. Until then the accessors answer `NotReady`; after a failed load
//! they keep answering with the failure.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analytics::{AnalyticsServer, AnalyticsView};
use crate::config::Config;
use crate::corpus::AlignedCorpus;
use crate::embedding::create_encoder;
use crate::error::{ConciergeError, Result};
use crate::history::QueryHistory;
use crate::resolver::{BookingProjection, QueryResolver};

const RESOLVER: &str = "vector index and record store";
const ANALYTICS: &str = "analytics cache";

pub struct AppContext {
  config: Config,
  resolver: OnceCell<Result<QueryResolver>>,
  analytics: OnceCell<Result<AnalyticsServer>>,
  history: QueryHistory,
}

/// Store the outcome of a load, handing back the failure if there was one
fn settle<T>(slot: &OnceCell<Result<T>>, outcome: Result<T>, resource: &str) -> Result<()> {
  let failure = outcome.as_ref().err().cloned();
  slot.set(outcome).map_err(|_| ConciergeError::io_failure(format!("{resource} already loaded")))?;
  failure.map_or(Ok(()), Err)
}

fn loaded<'a, T>(slot: &'a OnceCell<Result<T>>, resource: &str) -> Result<&'a T> {
  match slot.get() {
    Some(Ok(value)) => Ok(value),
    Some(Err(e)) => Err(e.clone()),
    None => Err(ConciergeError::not_ready(resource)),
  }
}

/// The cache must describe the same rows the resolver serves
fn check_analytics_source(analytics: &AnalyticsServer, corpus: &AlignedCorpus) -> Result<()> {
  let cache = analytics.cache();
  if cache.source_fingerprint != corpus.records().fingerprint() {
    return Err(ConciergeError::io_failure(format!(
      "analytics cache was computed from {} records that differ from the indexed snapshot \
       ({} records); rebuild the analytics cache",
      cache.record_count,
      corpus.len()
    )));
  }
  Ok(())
}

impl AppContext {
  /// A context with nothing loaded yet; only the history log is opened
  pub fn new(config: Config) -> Result<Self> {
    let history = QueryHistory::open(config.history_path())?;
    Ok(Self { config, resolver: OnceCell::new(), analytics: OnceCell::new(), history })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn history(&self) -> &QueryHistory {
    &self.history
  }

  pub fn resolver(&self) -> Result<&QueryResolver> {
    loaded(&self.resolver, RESOLVER)
  }

  pub fn analytics(&self) -> Result<&AnalyticsServer> {
    loaded(&self.analytics, ANALYTICS)
  }

  pub fn install_resolver(&self, resolver: QueryResolver) -> Result<()> {
    settle(&self.resolver, Ok(resolver), RESOLVER)
  }

  pub fn install_analytics(&self, analytics: AnalyticsServer) -> Result<()> {
    settle(&self.analytics, Ok(analytics), ANALYTICS)
  }

  pub fn is_ready(&self) -> bool {
    matches!(self.resolver.get(), Some(Ok(_))) && matches!(self.analytics.get(), Some(Ok(_)))
  }

  /// Whether either resource finished loading with an error
  pub fn load_failed(&self) -> bool {
    matches!(self.resolver.get(), Some(Err(_))) || matches!(self.analytics.get(), Some(Err(_)))
  }

  /// Answer a question and append it to the history log.
  ///
  /// Encoding runs on the blocking pool. A failed history append is logged
  /// but does not fail the request.
  pub async fn ask(self: &Arc<Self>, question: &str) -> Result<BookingProjection> {
    let context = Arc::clone(self);
    let query = question.to_string();

    let projection = tokio::task::spawn_blocking(move || context.resolver()?.resolve(&query))
      .await
      .map_err(|e| ConciergeError::io_failure(format!("query task failed: {e}")))??;

    if let Err(e) = self.history.record(question, &projection).await {
      warn!("Failed to record query history: {e}");
    }

    Ok(projection)
  }

  pub fn analytics_view(&self, analysis_type: &str) -> Result<AnalyticsView> {
    self.analytics()?.get(analysis_type)
  }

  /// Load the snapshot and index, then the analytics cache, then the encoder.
  ///
  /// Analytics are settled before the model loads, so they can be served
  /// while the encoder is still downloading. A cache computed from other rows
  /// than the indexed snapshot is refused.
  pub async fn load_resources(&self) -> Result<()> {
    let corpus = self.load_corpus();

    let analytics = AnalyticsServer::load(&self.config.analytics_path()).and_then(|server| {
      if let Ok(corpus) = &corpus {
        check_analytics_source(&server, corpus)?;
      }
      Ok(server)
    });
    match &analytics {
      Ok(_) => info!("Analytics cache ready"),
      Err(e) => warn!("Analytics unavailable: {e}"),
    }
    let analytics = settle(&self.analytics, analytics, ANALYTICS);

    let resolver = self.settle_resolver(corpus).await;
    analytics.and(resolver)
  }

  /// Load only what `ask` needs: snapshot, index and encoder
  pub async fn load_resolver(&self) -> Result<()> {
    let corpus = self.load_corpus();
    self.settle_resolver(corpus).await
  }

  fn load_corpus(&self) -> Result<AlignedCorpus> {
    AlignedCorpus::load(&self.config.snapshot_path(), &self.config.index_path())
  }

  async fn settle_resolver(&self, corpus: Result<AlignedCorpus>) -> Result<()> {
    let resolver = match corpus {
      Ok(corpus) => match create_encoder(&self.config.encoder).await {
        Ok(encoder) => QueryResolver::new(encoder, corpus),
        Err(e) => Err(e),
      },
      Err(e) => Err(e),
    };
    match &resolver {
      Ok(resolver) => info!("Query resolver ready ({} records)", resolver.corpus().len()),
      Err(e) => warn!("Query resolution unavailable: {e}"),
    }
    settle(&self.resolver, resolver, RESOLVER)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analytics::AnalyticsCacheBuilder;
  use crate::builder::IndexBuilder;
  use crate::config::EncoderBackend;
  use crate::embedding::HashingEncoder;
  use tempfile::TempDir;

  const DATASET: &str = "\
hotel,arrival_date,country,adr,lead_time,is_canceled
Resort Hotel,2015-07-01,PRT,0.0,342,0
City Hotel,2015-08-15,GBR,98.5,14,1
";

  fn config(root: &std::path::Path) -> Config {
    let mut config = Config::default().with_root(root);
    config.encoder.backend = EncoderBackend::Hashing;
    config.encoder.hashing_dimension = 48;
    config
  }

  fn build_artifacts(config: &Config) {
    std::fs::write(config.dataset_path(), DATASET).unwrap();
    let encoder = Arc::new(HashingEncoder::new(config.encoder.hashing_dimension).unwrap());
    IndexBuilder::new(encoder, 8)
      .run(&config.dataset_path(), &config.snapshot_path(), &config.index_path())
      .unwrap();
    AnalyticsCacheBuilder::run(&config.dataset_path(), &config.analytics_path()).unwrap();
  }

  #[tokio::test]
  async fn test_not_ready_before_loading() {
    let temp = TempDir::new().unwrap();
    let context = Arc::new(AppContext::new(config(temp.path())).unwrap());

    assert!(!context.is_ready());
    assert_eq!(context.ask("anything").await.unwrap_err().key(), "not_ready");
    assert_eq!(context.analytics_view("top_countries").unwrap_err().key(), "not_ready");
  }

  #[tokio::test]
  async fn test_load_then_ask_records_history() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_artifacts(&config);
    let context = Arc::new(AppContext::new(config).unwrap());

    context.load_resources().await.unwrap();
    assert!(context.is_ready());

    let records = context.resolver().unwrap().corpus().records();
    let sentence = records.get(1).unwrap().text_representation.clone();
    let projection = context.ask(&sentence).await.unwrap();
    assert_eq!(projection.country, "GBR");

    let history = context.history().recent(None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, sentence);
    assert_eq!(history[0].response["hotel"], "City Hotel");
  }

  #[tokio::test]
  async fn test_analytics_served_without_index() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    std::fs::write(config.dataset_path(), DATASET).unwrap();
    AnalyticsCacheBuilder::run(&config.dataset_path(), &config.analytics_path()).unwrap();
    let context = AppContext::new(config).unwrap();

    assert_eq!(context.load_resources().await.unwrap_err().key(), "io_failure");
    assert!(context.analytics_view("cancellation_rate").is_ok());
    assert_eq!(context.resolver().err().unwrap().key(), "io_failure");
    assert!(context.load_failed());
  }

  #[tokio::test]
  async fn test_failed_load_keeps_reporting_the_failure() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_artifacts(&config);

    // Same rows, reordered after the index was built
    let snapshot = std::fs::read_to_string(config.snapshot_path()).unwrap();
    let mut lines: Vec<&str> = snapshot.lines().collect();
    lines.swap(1, 2);
    std::fs::write(config.snapshot_path(), lines.join("\n")).unwrap();

    let context = Arc::new(AppContext::new(config).unwrap());
    assert_eq!(context.load_resources().await.unwrap_err().key(), "io_failure");

    assert_eq!(context.ask("any hotel").await.unwrap_err().key(), "io_failure");
    assert_eq!(context.ask("any hotel").await.unwrap_err().key(), "io_failure");
    assert!(!context.is_ready());
    assert!(context.load_failed());
  }

  #[tokio::test]
  async fn test_stale_analytics_cache_is_refused() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_artifacts(&config);

    // Analytics recomputed from a different export than the one indexed
    let other = temp.path().join("other.csv");
    std::fs::write(&other, format!("{DATASET}City Hotel,2016-01-03,ESP,61.2,3,0\n")).unwrap();
    AnalyticsCacheBuilder::run(&other, &config.analytics_path()).unwrap();

    let context = AppContext::new(config).unwrap();
    let err = context.load_resources().await.unwrap_err();

    assert_eq!(err.key(), "io_failure");
    assert!(err.to_string().contains("rebuild the analytics cache"));
    assert_eq!(context.analytics_view("top_countries").unwrap_err().key(), "io_failure");
    assert!(context.resolver().is_ok());
  }

  #[tokio::test]
  async fn test_second_install_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());
    build_artifacts(&config);
    let context = AppContext::new(config.clone()).unwrap();
    context.load_resources().await.unwrap();

    let again = AnalyticsServer::load(&config.analytics_path()).unwrap();
    assert!(context.install_analytics(again).is_err());
  }
}
