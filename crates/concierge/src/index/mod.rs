//! Exact nearest-neighbor search over a fixed, ordered set of vectors.
//!
//! Row `i` is the `i`-th vector handed to [`FlatIndex::build`]. Search is brute
//! force over every row; results are ordered by ascending squared L2 distance
//! and then by ascending row, so identical inputs always give identical output.

pub mod distance;
pub mod persistence;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{ConciergeError, Result};
use distance::squared_l2;

pub use persistence::{load_index, save_index, IndexFile};

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
  pub row: usize,
  /// Squared Euclidean distance
  pub distance: f32,
}

/// Brute-force vector index with rows stored contiguously
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
  dimension: usize,
  vectors: Vec<f32>,
  rows: usize,
  built: bool,
}

impl FlatIndex {
  /// An empty, unbuilt index accepting vectors of `dimension`
  pub fn new(dimension: usize) -> Self {
    Self { dimension, vectors: Vec::new(), rows: 0, built: false }
  }

  /// Replace the contents with `vectors`, in order.
  ///
  /// The whole input is validated before anything changes.
  pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
    if self.dimension == 0 {
      return Err(ConciergeError::build_failure("index dimension must be positive"));
    }
    if vectors.is_empty() {
      return Err(ConciergeError::build_failure("cannot build an index from zero vectors"));
    }
    if let Some((row, bad)) = vectors.iter().enumerate().find(|(_, v)| v.len() != self.dimension) {
      return Err(ConciergeError::build_failure(format!(
        "vector {row} has dimension {}, index expects {}",
        bad.len(),
        self.dimension
      )));
    }

    self.vectors = vectors.iter().flatten().copied().collect();
    self.rows = vectors.len();
    self.built = true;
    Ok(())
  }

  /// The `k` nearest rows to `query`
  pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
    if !self.built {
      return Err(ConciergeError::not_ready("vector index"));
    }
    if k == 0 {
      return Err(ConciergeError::invalid_input("k must be at least 1"));
    }
    if query.len() != self.dimension {
      return Err(ConciergeError::invalid_input(format!(
        "query has dimension {}, index expects {}",
        query.len(),
        self.dimension
      )));
    }

    let mut hits: Vec<Neighbor> = self
      .vectors
      .chunks_exact(self.dimension)
      .enumerate()
      .map(|(row, vector)| Neighbor { row, distance: squared_l2(query, vector) })
      .collect();

    let k = k.min(hits.len());
    if k < hits.len() {
      hits.select_nth_unstable_by(k - 1, compare);
      hits.truncate(k);
    }
    hits.sort_by(compare);

    Ok(hits)
  }

  /// Stored vector for `row`
  pub fn vector(&self, row: usize) -> Option<&[f32]> {
    if row >= self.rows {
      return None;
    }
    let start = row * self.dimension;
    Some(&self.vectors[start..start + self.dimension])
  }

  pub fn len(&self) -> usize {
    self.rows
  }

  pub fn is_empty(&self) -> bool {
    self.rows == 0
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }

  pub fn is_built(&self) -> bool {
    self.built
  }

  /// Structural consistency of a deserialized index
  pub(crate) fn validate(&self) -> Result<()> {
    if !self.built {
      return Ok(());
    }
    if self.dimension == 0 || self.rows == 0 {
      return Err(ConciergeError::io_failure(format!(
        "index claims {} rows of dimension {}",
        self.rows, self.dimension
      )));
    }
    if self.rows.checked_mul(self.dimension) != Some(self.vectors.len()) {
      return Err(ConciergeError::io_failure(format!(
        "index holds {} values, expected {} rows of dimension {}",
        self.vectors.len(),
        self.rows,
        self.dimension
      )));
    }
    Ok(())
  }
}

fn compare(a: &Neighbor, b: &Neighbor) -> Ordering {
  a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row))
}
