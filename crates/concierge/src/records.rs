//! Booking records and the immutable, ordered store they live in.
//!
//! The store is loaded from a CSV snapshot. Row order is the file order and
//! never changes afterwards: row `i` of the store is row `i` of the vector
//! index built from it.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{ConciergeError, Result};
use crate::persist::{fnv1a, write_atomically};

const UNKNOWN_COUNTRY: &str = "Unknown";

/// A single hotel booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
  pub hotel: String,
  pub arrival_date: NaiveDate,
  pub country: String,
  /// Average daily rate
  pub price: f64,
  pub lead_time: u32,
  pub is_canceled: bool,
  /// The exact sentence that was embedded for this record
  pub text_representation: String,
}

impl BookingRecord {
  pub fn new(
    hotel: impl Into<String>,
    arrival_date: NaiveDate,
    country: impl Into<String>,
    price: f64,
    lead_time: u32,
    is_canceled: bool,
  ) -> Self {
    let hotel = hotel.into();
    let country = country.into();
    let text_representation = describe(&hotel, arrival_date, &country, price, is_canceled);

    Self { hotel, arrival_date, country, price, lead_time, is_canceled, text_representation }
  }
}

/// Fixed sentence template embedded for every record.
///
/// Persisted indexes carry a fingerprint of these sentences, so editing the
/// template makes every existing index fail to load until it is rebuilt.
pub fn describe(
  hotel: &str,
  arrival_date: NaiveDate,
  country: &str,
  price: f64,
  canceled: bool,
) -> String {
  let canceled = if canceled { "True" } else { "False" };
  format!(
    "Booking in {hotel} on {arrival_date} by guest from {country}. Price: {price:?}€, Canceled: {canceled}"
  )
}

// Snapshot rows
// =============

/// Raw CSV row. Every column is optional so that cleaned snapshots and raw
/// exports (split arrival date columns) both parse.
#[derive(Debug, Default, Deserialize)]
struct SnapshotRow {
  #[serde(default)]
  hotel: Option<String>,
  #[serde(default)]
  arrival_date: Option<String>,
  #[serde(default)]
  arrival_date_year: Option<String>,
  #[serde(default)]
  arrival_date_month: Option<String>,
  #[serde(default)]
  arrival_date_day_of_month: Option<String>,
  #[serde(default)]
  country: Option<String>,
  #[serde(default)]
  adr: Option<String>,
  #[serde(default)]
  lead_time: Option<String>,
  #[serde(default)]
  is_canceled: Option<String>,
}

/// Canonical row written back by the index builder
#[derive(Debug, Serialize)]
struct CanonicalRow<'a> {
  hotel: &'a str,
  arrival_date: String,
  country: &'a str,
  adr: f64,
  lead_time: u32,
  is_canceled: u8,
  text_data: &'a str,
}

fn present(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn missing(row: usize, field: &str) -> ConciergeError {
  ConciergeError::build_failure(format!("row {row}: required field '{field}' is missing"))
}

fn malformed(row: usize, field: &str, raw: &str) -> ConciergeError {
  ConciergeError::build_failure(format!("row {row}: '{raw}' is not a valid {field}"))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
}

fn parse_flag(raw: &str) -> Option<bool> {
  match raw.to_ascii_lowercase().as_str() {
    "1" | "1.0" | "true" | "yes" => Some(true),
    "0" | "0.0" | "false" | "no" => Some(false),
    _ => None,
  }
}

fn parse_days(raw: &str) -> Option<u32> {
  raw.parse::<u32>().ok().or_else(|| {
    raw
      .parse::<f64>()
      .ok()
      .filter(|days| days.is_finite() && *days >= 0.0 && days.fract() == 0.0)
      .map(|days| days as u32)
  })
}

impl SnapshotRow {
  fn into_record(self, row: usize) -> Result<BookingRecord> {
    let arrival_date = self.resolve_arrival_date(row)?;

    let hotel = present(self.hotel).ok_or_else(|| missing(row, "hotel"))?;

    let raw_price = present(self.adr).ok_or_else(|| missing(row, "adr"))?;
    let price = raw_price
      .parse::<f64>()
      .ok()
      .filter(|p| p.is_finite())
      .ok_or_else(|| malformed(row, "adr", &raw_price))?;

    let country = present(self.country).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

    let lead_time = match present(self.lead_time) {
      Some(raw) => parse_days(&raw).ok_or_else(|| malformed(row, "lead_time", &raw))?,
      None => 0,
    };

    let is_canceled = match present(self.is_canceled) {
      Some(raw) => parse_flag(&raw).ok_or_else(|| malformed(row, "is_canceled", &raw))?,
      None => false,
    };

    Ok(BookingRecord::new(hotel, arrival_date, country, price, lead_time, is_canceled))
  }

  fn resolve_arrival_date(&self, row: usize) -> Result<NaiveDate> {
    if let Some(raw) = present(self.arrival_date.clone()) {
      return parse_date(&raw).ok_or_else(|| malformed(row, "arrival_date", &raw));
    }

    let year = present(self.arrival_date_year.clone());
    let month = present(self.arrival_date_month.clone());
    let day = present(self.arrival_date_day_of_month.clone());

    match (year, month, day) {
      (Some(year), Some(month), Some(day)) => {
        let composed = format!("{year}-{month}-{day}");
        NaiveDate::parse_from_str(&composed, "%Y-%B-%d")
          .or_else(|_| NaiveDate::parse_from_str(&composed, "%Y-%m-%d"))
          .map_err(|_| malformed(row, "arrival date", &composed))
      }
      _ => Err(missing(row, "arrival_date")),
    }
  }
}

// Record store
// ============

/// Immutable, ordered table of booking records
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore {
  records: Vec<BookingRecord>,
}

impl RecordStore {
  /// Wrap an ordered list of records. An empty list is rejected.
  pub fn from_records(records: Vec<BookingRecord>) -> Result<Self> {
    if records.is_empty() {
      return Err(ConciergeError::build_failure("dataset contains no booking records"));
    }
    Ok(Self { records })
  }

  /// Load a CSV snapshot, keeping file order
  pub fn load(path: &Path) -> Result<Self> {
    let file = File::open(path).map_err(|e| {
      ConciergeError::io_failure(format!("failed to open snapshot {}: {e}", path.display()))
    })?;
    let store = Self::from_reader(file)?;
    info!("Loaded {} booking records from {}", store.len(), path.display());
    Ok(store)
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let records = csv_reader
      .deserialize::<SnapshotRow>()
      .enumerate()
      .map(|(i, row)| row.map_err(ConciergeError::from).and_then(|row| row.into_record(i + 1)))
      .collect::<Result<Vec<_>>>()?;

    Self::from_records(records)
  }

  /// Write the canonical snapshot (including the embedded sentence per row)
  pub fn persist(&self, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in &self.records {
      writer.serialize(CanonicalRow {
        hotel: &record.hotel,
        arrival_date: record.arrival_date.to_string(),
        country: &record.country,
        adr: record.price,
        lead_time: record.lead_time,
        is_canceled: u8::from(record.is_canceled),
        text_data: &record.text_representation,
      })?;
    }
    let bytes = writer
      .into_inner()
      .map_err(|e| ConciergeError::io_failure(format!("failed to flush snapshot: {e}")))?;

    write_atomically(path, &bytes)?;
    info!("Wrote {} records to snapshot {}", self.len(), path.display());
    Ok(())
  }

  pub fn get(&self, index: usize) -> Result<&BookingRecord> {
    self.records.get(index).ok_or_else(|| ConciergeError::record_not_found(index, self.len()))
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Always false for a constructed store; present for API symmetry with `len`
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &BookingRecord> {
    self.records.iter()
  }

  /// Embedded sentences in row order
  pub fn texts(&self) -> Vec<String> {
    self.records.iter().map(|r| r.text_representation.clone()).collect()
  }

  /// Order-sensitive hash of every row's embedded sentence
  pub fn fingerprint(&self) -> u64 {
    fnv1a(self.records.iter().map(|r| r.text_representation.as_bytes()))
  }
}
