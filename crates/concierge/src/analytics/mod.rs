//! Precomputed aggregate views over the booking dataset.
//!
//! [`AnalyticsCacheBuilder`] computes every view once, offline, and writes a
//! single JSON cache. [`AnalyticsServer`] only ever reads that cache.

pub mod server;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::error::{ConciergeError, Result};
use crate::persist::{read_artifact, write_atomically};
use crate::records::RecordStore;

pub use server::AnalyticsServer;

const TOP_COUNTRIES: usize = 5;

/// The fixed set of analyses served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
  RevenueTrends,
  CancellationRate,
  TopCountries,
  LeadTimeDistribution,
}

impl AnalysisType {
  pub const ALL: [AnalysisType; 4] = [
    AnalysisType::RevenueTrends,
    AnalysisType::CancellationRate,
    AnalysisType::TopCountries,
    AnalysisType::LeadTimeDistribution,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::RevenueTrends => "revenue_trends",
      Self::CancellationRate => "cancellation_rate",
      Self::TopCountries => "top_countries",
      Self::LeadTimeDistribution => "lead_time_distribution",
    }
  }
}

impl fmt::Display for AnalysisType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AnalysisType {
  type Err = ConciergeError;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| ConciergeError::invalid_analysis_type(s))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CountryCount {
  pub country: String,
  pub count: u64,
}

/// Every view, computed from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsCache {
  /// "YYYY-MM" to summed daily rate, chronological
  pub revenue_trends: BTreeMap<String, f64>,
  /// Percentage of canceled bookings, unrounded; formatted when served
  pub cancellation_rate: f64,
  /// Most frequent countries, ties in first-seen order
  pub top_countries: Vec<CountryCount>,
  /// Mean lead time in days, rounded to 2 decimals
  pub lead_time_distribution: f64,
  pub record_count: usize,
  /// Fingerprint of the records the cache was computed from
  pub source_fingerprint: u64,
}

/// One view as served to callers. Serializes as `{"<analysis type>": result}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsView {
  RevenueTrends(BTreeMap<String, f64>),
  /// Formatted like "30.00%"
  CancellationRate(String),
  TopCountries(Vec<CountryCount>),
  LeadTimeDistribution(f64),
}

impl AnalyticsCache {
  pub fn view(&self, kind: AnalysisType) -> AnalyticsView {
    match kind {
      AnalysisType::RevenueTrends => AnalyticsView::RevenueTrends(self.revenue_trends.clone()),
      AnalysisType::CancellationRate => {
        AnalyticsView::CancellationRate(format!("{:.2}%", self.cancellation_rate))
      }
      AnalysisType::TopCountries => AnalyticsView::TopCountries(self.top_countries.clone()),
      AnalysisType::LeadTimeDistribution => {
        AnalyticsView::LeadTimeDistribution(self.lead_time_distribution)
      }
    }
  }

  pub fn persist(&self, path: &Path) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(self)?;
    bytes.push(b'\n');
    write_atomically(path, &bytes)?;
    info!("Wrote analytics cache {} ({} records)", path.display(), self.record_count);
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self> {
    let bytes = read_artifact(path)?;
    let cache: Self = serde_json::from_slice(&bytes).map_err(|e| {
      ConciergeError::io_failure(format!("analytics cache {} is unreadable: {e}", path.display()))
    })?;
    info!("Loaded analytics cache {} ({} records)", path.display(), cache.record_count);
    Ok(cache)
  }
}

/// Round to 2 decimals from the exact binary value, ties to even.
///
/// Scaling by 100 first would round the product instead of the stored value.
fn round2(value: f64) -> f64 {
  format!("{value:.2}").parse().unwrap_or(value)
}

pub struct AnalyticsCacheBuilder;

impl AnalyticsCacheBuilder {
  pub fn build(records: &RecordStore) -> Result<AnalyticsCache> {
    if records.is_empty() {
      return Err(ConciergeError::build_failure("cannot compute analytics over zero records"));
    }
    let total = records.len() as f64;

    let mut revenue_trends = BTreeMap::new();
    let mut canceled = 0usize;
    let mut lead_time_sum = 0u64;
    let mut countries: Vec<CountryCount> = Vec::new();
    let mut country_slots: HashMap<&str, usize> = HashMap::new();

    for record in records.iter() {
      *revenue_trends.entry(record.arrival_date.format("%Y-%m").to_string()).or_insert(0.0) +=
        record.price;

      if record.is_canceled {
        canceled += 1;
      }
      lead_time_sum += u64::from(record.lead_time);

      match country_slots.get(record.country.as_str()) {
        Some(&slot) => countries[slot].count += 1,
        None => {
          country_slots.insert(&record.country, countries.len());
          countries.push(CountryCount { country: record.country.clone(), count: 1 });
        }
      }
    }

    // Stable sort keeps first-encounter order among equal counts
    countries.sort_by(|a, b| b.count.cmp(&a.count));
    countries.truncate(TOP_COUNTRIES);

    Ok(AnalyticsCache {
      revenue_trends,
      cancellation_rate: canceled as f64 / total * 100.0,
      top_countries: countries,
      lead_time_distribution: round2(lead_time_sum as f64 / total),
      record_count: records.len(),
      source_fingerprint: records.fingerprint(),
    })
  }

  /// Offline job: load the dataset, compute every view and persist the cache
  pub fn run(dataset: &Path, cache_path: &Path) -> Result<AnalyticsCache> {
    info!("Building analytics from {}", dataset.display());
    let records = RecordStore::load(dataset)?;
    let cache = Self::build(&records)?;
    cache.persist(cache_path)?;
    Ok(cache)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::records::BookingRecord;
  use chrono::NaiveDate;
  use tempfile::TempDir;

  fn record(month: u32, country: &str, price: f64, lead_time: u32, canceled: bool) -> BookingRecord {
    let date = NaiveDate::from_ymd_opt(2016, month, 10).unwrap();
    BookingRecord::new("City Hotel", date, country, price, lead_time, canceled)
  }

  #[test]
  fn test_cancellation_rate_three_of_ten() {
    let records: Vec<_> = (0..10).map(|i| record(1, "PRT", 50.0, 10, i < 3)).collect();
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    assert!((cache.cancellation_rate - 30.0).abs() < 1e-9);
    assert_eq!(
      cache.view(AnalysisType::CancellationRate),
      AnalyticsView::CancellationRate("30.00%".to_string())
    );
  }

  #[test]
  fn test_cancellation_rate_rounded_once() {
    let records: Vec<_> = (0..800).map(|i| record(1, "PRT", 50.0, 10, i == 0)).collect();
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    assert_eq!(cache.cancellation_rate, 0.125);
    assert_eq!(
      cache.view(AnalysisType::CancellationRate),
      AnalyticsView::CancellationRate("0.12%".to_string())
    );
  }

  #[test]
  fn test_round2_uses_the_stored_value() {
    // 1.005 is stored just below the half-way point
    assert_eq!(round2(1.005), 1.0);
    assert_eq!(round2(0.125), 0.12);
    assert_eq!(round2(0.375), 0.38);
    assert_eq!(round2(83.3), 83.3);
  }

  #[test]
  fn test_top_countries_ties_keep_first_seen_order() {
    let mut records = Vec::new();
    for (country, count) in [("A", 10), ("B", 10), ("C", 8), ("D", 8), ("E", 5), ("F", 1)] {
      records.extend((0..count).map(|_| record(2, country, 10.0, 1, false)));
    }
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    let ranked: Vec<(&str, u64)> =
      cache.top_countries.iter().map(|c| (c.country.as_str(), c.count)).collect();
    assert_eq!(ranked, vec![("A", 10), ("B", 10), ("C", 8), ("D", 8), ("E", 5)]);
  }

  #[test]
  fn test_top_countries_tie_order_follows_encounter_not_name() {
    let records = vec![
      record(1, "ZAF", 1.0, 1, false),
      record(1, "AUT", 1.0, 1, false),
      record(1, "AUT", 1.0, 1, false),
      record(1, "ZAF", 1.0, 1, false),
    ];
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    assert_eq!(cache.top_countries[0].country, "ZAF");
    assert_eq!(cache.top_countries[1].country, "AUT");
  }

  #[test]
  fn test_revenue_trends_chronological_sums() {
    let records = vec![
      record(11, "PRT", 100.0, 1, false),
      record(2, "PRT", 20.5, 1, false),
      record(11, "PRT", 50.0, 1, true),
    ];
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    let months: Vec<(&str, f64)> = cache.revenue_trends.iter().map(|(m, v)| (m.as_str(), *v)).collect();
    assert_eq!(months, vec![("2016-02", 20.5), ("2016-11", 150.0)]);
  }

  #[test]
  fn test_lead_time_average_rounded() {
    let records = vec![
      record(1, "PRT", 1.0, 1, false),
      record(1, "PRT", 1.0, 2, false),
      record(1, "PRT", 1.0, 2, false),
    ];
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    assert_eq!(cache.lead_time_distribution, 1.67);
  }

  #[test]
  fn test_view_serializes_under_its_type_name() {
    let records = vec![record(1, "PRT", 1.0, 4, false)];
    let cache = AnalyticsCacheBuilder::build(&RecordStore::from_records(records).unwrap()).unwrap();

    let json = serde_json::to_value(cache.view(AnalysisType::LeadTimeDistribution)).unwrap();
    assert_eq!(json, serde_json::json!({"lead_time_distribution": 4.0}));
  }

  #[test]
  fn test_rebuild_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let dataset = temp.path().join("bookings.csv");
    std::fs::write(
      &dataset,
      "hotel,arrival_date,country,adr,lead_time,is_canceled\n\
       Resort Hotel,2015-07-01,PRT,0.1,342,0\n\
       City Hotel,2015-08-15,GBR,98.7,14,1\n\
       City Hotel,2015-08-20,GBR,0.2,7,0\n",
    )
    .unwrap();
    let cache_path = temp.path().join("analytics.json");

    AnalyticsCacheBuilder::run(&dataset, &cache_path).unwrap();
    let first = std::fs::read(&cache_path).unwrap();
    AnalyticsCacheBuilder::run(&dataset, &cache_path).unwrap();
    let second = std::fs::read(&cache_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(AnalyticsCache::load(&cache_path).unwrap().record_count, 3);
  }

  #[test]
  fn test_parse_analysis_type() {
    assert_eq!("top_countries".parse::<AnalysisType>().unwrap(), AnalysisType::TopCountries);

    let err = "nonsense".parse::<AnalysisType>().unwrap_err();
    assert_eq!(err.to_string(), "Invalid type");
  }
}
