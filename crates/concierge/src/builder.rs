//! Offline index build: dataset -> sentences -> vectors -> aligned corpus on disk.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::corpus::AlignedCorpus;
use crate::embedding::EmbeddingEncoder;
use crate::error::{ConciergeError, Result};
use crate::index::FlatIndex;
use crate::records::RecordStore;

pub struct IndexBuilder {
  encoder: Arc<dyn EmbeddingEncoder>,
  batch_size: usize,
  cancel: Option<Arc<AtomicBool>>,
}

impl IndexBuilder {
  pub fn new(encoder: Arc<dyn EmbeddingEncoder>, batch_size: usize) -> Self {
    Self { encoder, batch_size: batch_size.max(1), cancel: None }
  }

  /// Abort between batches once `flag` is set
  pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
    self.cancel = Some(flag);
    self
  }

  /// Encode every record and pair the resulting index with the store
  pub fn build(&self, records: RecordStore) -> Result<AlignedCorpus> {
    let started = Instant::now();
    let texts = records.texts();
    let dimension = self.encoder.dimension();
    let total_batches = texts.len().div_ceil(self.batch_size);

    info!("Encoding {} records in {} batches", texts.len(), total_batches);

    let mut vectors = Vec::with_capacity(texts.len());
    for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
      if self.cancelled() {
        return Err(ConciergeError::build_failure(format!(
          "cancelled after {} of {} records",
          vectors.len(),
          texts.len()
        )));
      }

      let encoded = self.encoder.encode_batch(batch).map_err(|e| {
        ConciergeError::build_failure(format!("encoding batch {}: {e}", batch_number + 1))
      })?;
      if encoded.len() != batch.len() {
        return Err(ConciergeError::build_failure(format!(
          "encoder returned {} vectors for a batch of {}",
          encoded.len(),
          batch.len()
        )));
      }

      vectors.extend(encoded);
      debug!("Encoded batch {}/{}", batch_number + 1, total_batches);
    }

    let mut index = FlatIndex::new(dimension);
    index.build(&vectors)?;

    info!("Built index of {} rows in {:.2?}", index.len(), started.elapsed());
    AlignedCorpus::new(records, index, self.encoder.model_id())
  }

  /// Full offline job: load the dataset, build, then persist snapshot and index
  pub fn run(&self, dataset: &Path, snapshot: &Path, index_path: &Path) -> Result<AlignedCorpus> {
    info!("Building index from {}", dataset.display());

    let records = RecordStore::load(dataset)?;
    let corpus = self.build(records)?;
    corpus.persist(snapshot, index_path)?;

    Ok(corpus)
  }

  fn cancelled(&self) -> bool {
    self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
  }
}
