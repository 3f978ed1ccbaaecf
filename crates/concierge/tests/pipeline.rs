//! End-to-end build and lookup over the fixture dataset with the hashing encoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use concierge::analytics::{AnalyticsCacheBuilder, AnalyticsServer, AnalyticsView, CountryCount};
use concierge::builder::IndexBuilder;
use concierge::corpus::AlignedCorpus;
use concierge::embedding::{EmbeddingEncoder, HashingEncoder};
use concierge::records::RecordStore;
use concierge::resolver::{BookingProjection, QueryResolver};
use tempfile::TempDir;

fn fixture() -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join("bookings.csv")
}

fn encoder() -> Arc<dyn EmbeddingEncoder> {
  Arc::new(HashingEncoder::new(256).unwrap())
}

struct Built {
  _temp: TempDir,
  snapshot: PathBuf,
  index: PathBuf,
}

fn build() -> Built {
  let temp = TempDir::new().unwrap();
  let snapshot = temp.path().join("snapshot.csv");
  let index = temp.path().join("index.bin");

  IndexBuilder::new(encoder(), 4).run(&fixture(), &snapshot, &index).unwrap();
  Built { _temp: temp, snapshot, index }
}

fn resolver(built: &Built) -> QueryResolver {
  QueryResolver::new(encoder(), AlignedCorpus::load(&built.snapshot, &built.index).unwrap()).unwrap()
}

#[test]
fn test_every_record_retrieves_itself() {
  let built = build();
  let resolver = resolver(&built);
  let records = resolver.corpus().records();

  for row in 0..records.len() {
    let record = records.get(row).unwrap();
    let ranked = resolver.resolve_top_k(&record.text_representation, 1).unwrap();

    assert_eq!(ranked[0].row, row);
    assert_eq!(ranked[0].distance, 0.0, "row {row}");
    assert_eq!(ranked[0].booking, BookingProjection::from(record), "row {row}");
  }
}

#[test]
fn test_exact_sentence_returns_fields_unchanged() {
  let built = build();
  let resolver = resolver(&built);

  let projection = resolver
    .resolve("Booking in City Hotel on 2015-08-20 by guest from ESP. Price: 82.5€, Canceled: True")
    .unwrap();

  assert_eq!(
    projection,
    BookingProjection {
      hotel: "City Hotel".to_string(),
      arrival_date: "2015-08-20".to_string(),
      country: "ESP".to_string(),
      price: 82.5,
      canceled: true,
    }
  );
}

#[test]
fn test_rebuild_from_same_dataset_is_aligned_identically() {
  let first = build();
  let second = build();

  let a = AlignedCorpus::load(&first.snapshot, &first.index).unwrap();
  let b = AlignedCorpus::load(&second.snapshot, &second.index).unwrap();

  assert_eq!(a.records(), b.records());
  assert_eq!(a.index(), b.index());
  assert_eq!(std::fs::read(&first.index).unwrap(), std::fs::read(&second.index).unwrap());
}

#[test]
fn test_reloaded_index_answers_identically() {
  let built = build();
  let records = RecordStore::load(&fixture()).unwrap();
  let in_memory = IndexBuilder::new(encoder(), 3).build(records).unwrap();
  let reloaded = AlignedCorpus::load(&built.snapshot, &built.index).unwrap();

  let queries = [
    "resort hotel in july",
    "canceled city hotel booking from portugal",
    "christmas stay germany",
    "cheap spring booking ireland",
  ];
  for query in queries {
    let vector = encoder().encode(query).unwrap();
    let expected = in_memory.index().search(&vector, 5).unwrap();
    let actual = reloaded.index().search(&vector, 5).unwrap();
    assert_eq!(expected, actual, "query {query:?}");
  }
}

#[test]
fn test_snapshot_swapped_after_build_is_rejected() {
  let built = build();
  let mut rows: Vec<String> =
    std::fs::read_to_string(&built.snapshot).unwrap().lines().map(str::to_string).collect();
  rows.swap(1, 2);
  std::fs::write(&built.snapshot, rows.join("\n")).unwrap();

  let err = AlignedCorpus::load(&built.snapshot, &built.index).unwrap_err();
  assert_eq!(err.key(), "io_failure");
}

#[test]
fn test_analytics_over_fixture() {
  let temp = TempDir::new().unwrap();
  let cache_path = temp.path().join("analytics.json");
  AnalyticsCacheBuilder::run(&fixture(), &cache_path).unwrap();

  let server = AnalyticsServer::load(&cache_path).unwrap();

  assert_eq!(
    server.get("cancellation_rate").unwrap(),
    AnalyticsView::CancellationRate("30.00%".to_string())
  );

  let AnalyticsView::TopCountries(countries) = server.get("top_countries").unwrap() else {
    panic!("expected top countries");
  };
  assert_eq!(countries.len(), 5);
  assert_eq!(countries[0], CountryCount { country: "PRT".to_string(), count: 3 });
  assert_eq!(countries[1], CountryCount { country: "GBR".to_string(), count: 2 });
  assert_eq!(countries[2].country, "ESP");

  assert_eq!(server.get("lead_time_distribution").unwrap(), AnalyticsView::LeadTimeDistribution(83.3));
  assert_eq!(server.get("nonsense").unwrap_err().to_string(), "Invalid type");
}
