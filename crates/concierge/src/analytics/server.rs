use std::path::Path;

use crate::analytics::{AnalysisType, AnalyticsCache, AnalyticsView};
use crate::error::Result;

/// Read-only lookups into a loaded cache. Nothing is recomputed per request.
#[derive(Debug, Clone)]
pub struct AnalyticsServer {
  cache: AnalyticsCache,
}

impl AnalyticsServer {
  pub fn new(cache: AnalyticsCache) -> Self {
    Self { cache }
  }

  pub fn load(path: &Path) -> Result<Self> {
    Ok(Self::new(AnalyticsCache::load(path)?))
  }

  /// Serve the named view; unknown names are `InvalidAnalysisType`
  pub fn get(&self, analysis_type: &str) -> Result<AnalyticsView> {
    let kind: AnalysisType = analysis_type.parse()?;
    Ok(self.cache.view(kind))
  }

  pub fn cache(&self) -> &AnalyticsCache {
    &self.cache
  }
}
