//! Runtime query path: text -> vector -> nearest row -> projection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::corpus::AlignedCorpus;
use crate::embedding::{validate_text, EmbeddingEncoder};
use crate::error::{ConciergeError, Result};
use crate::records::BookingRecord;

/// Public view of a booking returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BookingProjection {
  pub hotel: String,
  /// ISO-8601 calendar date
  pub arrival_date: String,
  pub country: String,
  pub price: f64,
  pub canceled: bool,
}

impl From<&BookingRecord> for BookingProjection {
  fn from(record: &BookingRecord) -> Self {
    Self {
      hotel: record.hotel.clone(),
      arrival_date: record.arrival_date.format("%Y-%m-%d").to_string(),
      country: record.country.clone(),
      price: record.price,
      canceled: record.is_canceled,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedProjection {
  #[serde(flatten)]
  pub booking: BookingProjection,
  /// Row of the record in the snapshot
  pub row: usize,
  /// Squared Euclidean distance to the query
  pub distance: f32,
}

pub struct QueryResolver {
  encoder: Arc<dyn EmbeddingEncoder>,
  corpus: AlignedCorpus,
}

impl QueryResolver {
  /// Refuses an encoder that did not produce the corpus vectors
  pub fn new(encoder: Arc<dyn EmbeddingEncoder>, corpus: AlignedCorpus) -> Result<Self> {
    if encoder.dimension() != corpus.dimension() {
      return Err(ConciergeError::io_failure(format!(
        "encoder produces {}-dimensional vectors but the index holds {}",
        encoder.dimension(),
        corpus.dimension()
      )));
    }
    if encoder.model_id() != corpus.model_id() {
      return Err(ConciergeError::io_failure(format!(
        "index was built with '{}' but the encoder is '{}'; rebuild the index",
        corpus.model_id(),
        encoder.model_id()
      )));
    }
    Ok(Self { encoder, corpus })
  }

  /// The single closest booking to `query`
  pub fn resolve(&self, query: &str) -> Result<BookingProjection> {
    self
      .resolve_top_k(query, 1)?
      .into_iter()
      .next()
      .map(|ranked| ranked.booking)
      .ok_or_else(|| ConciergeError::not_ready("vector index"))
  }

  /// Up to `k` bookings, closest first, ties going to the lower row
  pub fn resolve_top_k(&self, query: &str, k: usize) -> Result<Vec<RankedProjection>> {
    validate_text(query)?;

    let vector = self.encoder.encode(query)?;
    let hits = self.corpus.nearest(&vector, k)?;
    debug!("Resolved query to {} hits", hits.len());

    Ok(
      hits
        .into_iter()
        .map(|(row, record, distance)| RankedProjection { booking: record.into(), row, distance })
        .collect(),
    )
  }

  pub fn corpus(&self) -> &AlignedCorpus {
    &self.corpus
  }
}
