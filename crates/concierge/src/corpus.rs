//! The record store and the vector index, held as one value.
//!
//! An [`AlignedCorpus`] can only be constructed when row `i` of the index was
//! built from row `i` of the store, so lookups never have to re-check it.

use std::path::Path;
use tracing::info;

use crate::error::{ConciergeError, Result};
use crate::index::{load_index, save_index, FlatIndex, IndexFile, Neighbor};
use crate::records::{BookingRecord, RecordStore};

#[derive(Debug, Clone)]
pub struct AlignedCorpus {
  records: RecordStore,
  index: FlatIndex,
  model_id: String,
}

impl AlignedCorpus {
  /// Pair a freshly built index with the store it was built from
  pub fn new(records: RecordStore, index: FlatIndex, model_id: impl Into<String>) -> Result<Self> {
    if !index.is_built() {
      return Err(ConciergeError::build_failure("index must be built before pairing"));
    }
    if index.len() != records.len() {
      return Err(ConciergeError::build_failure(format!(
        "index has {} rows but the record store has {}",
        index.len(),
        records.len()
      )));
    }
    Ok(Self { records, index, model_id: model_id.into() })
  }

  /// Load a persisted snapshot and index, rejecting any pair that drifted apart
  pub fn load(snapshot: &Path, index_path: &Path) -> Result<Self> {
    let records = RecordStore::load(snapshot)?;
    let file = load_index(index_path)?;

    if file.index.len() != records.len() {
      return Err(ConciergeError::io_failure(format!(
        "index {} has {} rows but snapshot {} has {}; rebuild the index",
        index_path.display(),
        file.index.len(),
        snapshot.display(),
        records.len()
      )));
    }
    if file.fingerprint != records.fingerprint() {
      return Err(ConciergeError::io_failure(format!(
        "index {} was built from a different snapshot than {}; rebuild the index",
        index_path.display(),
        snapshot.display()
      )));
    }

    info!("Loaded aligned corpus of {} records (model {})", records.len(), file.model_id);
    Ok(Self { records, index: file.index, model_id: file.model_id })
  }

  /// Write the snapshot and the index; the index goes last so a crash in
  /// between leaves a pair that fails the fingerprint check
  pub fn persist(&self, snapshot: &Path, index_path: &Path) -> Result<()> {
    self.records.persist(snapshot)?;
    let file = IndexFile::new(self.model_id.clone(), self.records.fingerprint(), self.index.clone());
    save_index(&file, index_path)
  }

  /// The `k` closest records with their rows and distances
  pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, &BookingRecord, f32)>> {
    self
      .index
      .search(query, k)?
      .into_iter()
      .map(|Neighbor { row, distance }| {
        self.records.get(row).map(|record| (row, record, distance))
      })
      .collect()
  }

  pub fn records(&self) -> &RecordStore {
    &self.records
  }

  pub fn index(&self) -> &FlatIndex {
    &self.index
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn dimension(&self) -> usize {
    self.index.dimension()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
