//! Binary index blob.
//!
//! Layout: `[bincode IndexFile][magic "CIX1"][CRC32 of payload, big endian]`.
//! The blob is written through a temp file and renamed into place.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConciergeError, Result};
use crate::index::FlatIndex;
use crate::persist::{read_artifact, write_atomically};

const INDEX_CRC_MAGIC: &[u8; 4] = b"CIX1";
pub const FORMAT_VERSION: u32 = 1;

/// Everything persisted alongside the vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFile {
  pub format_version: u32,
  /// Encoder that produced the vectors
  pub model_id: String,
  /// Fingerprint of the record store the rows are aligned with
  pub fingerprint: u64,
  pub index: FlatIndex,
}

impl IndexFile {
  pub fn new(model_id: impl Into<String>, fingerprint: u64, index: FlatIndex) -> Self {
    Self { format_version: FORMAT_VERSION, model_id: model_id.into(), fingerprint, index }
  }
}

pub fn save_index(file: &IndexFile, path: &Path) -> Result<()> {
  if !file.index.is_built() {
    return Err(ConciergeError::not_ready("vector index"));
  }

  let payload = bincode::serialize(file)?;
  let crc = crc32fast::hash(&payload);

  let mut output = Vec::with_capacity(payload.len() + 8);
  output.extend_from_slice(&payload);
  output.extend_from_slice(INDEX_CRC_MAGIC);
  output.extend_from_slice(&crc.to_be_bytes());

  write_atomically(path, &output)?;

  info!(
    "Saved index {} ({} rows, {} bytes, CRC32={:#010x})",
    path.display(),
    file.index.len(),
    payload.len(),
    crc
  );
  Ok(())
}

pub fn load_index(path: &Path) -> Result<IndexFile> {
  let raw = read_artifact(path)?;
  let corrupt = |reason: String| {
    ConciergeError::io_failure(format!("index {} is corrupt: {reason}", path.display()))
  };

  if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != INDEX_CRC_MAGIC {
    return Err(corrupt("missing checksum footer".to_string()));
  }

  let (payload, footer) = raw.split_at(raw.len() - 8);
  let stored_crc = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
  let computed_crc = crc32fast::hash(payload);
  if stored_crc != computed_crc {
    return Err(corrupt(format!(
      "CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
    )));
  }
  debug!("Index CRC32 verified: {:#010x}", stored_crc);

  let file: IndexFile =
    bincode::deserialize(payload).map_err(|e| corrupt(format!("undecodable payload: {e}")))?;

  if file.format_version != FORMAT_VERSION {
    return Err(corrupt(format!(
      "unsupported format version {} (expected {FORMAT_VERSION})",
      file.format_version
    )));
  }
  if !file.index.is_built() {
    return Err(corrupt("index was never built".to_string()));
  }
  file.index.validate()?;

  info!("Loaded index {} ({} rows)", path.display(), file.index.len());
  Ok(file)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn sample() -> IndexFile {
    let mut index = FlatIndex::new(3);
    index.build(&[vec![0.1, 0.2, 0.3], vec![-1.0, f32::MIN_POSITIVE, 7.5]]).unwrap();
    IndexFile::new("hashing-v1-3", 42, index)
  }

  #[test]
  fn test_roundtrip_is_bit_identical() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.bin");
    let file = sample();

    save_index(&file, &path).unwrap();
    let loaded = load_index(&path).unwrap();

    assert_eq!(loaded, file);
    let saved_bits: Vec<u32> = file.index.vector(1).unwrap().iter().map(|v| v.to_bits()).collect();
    let loaded_bits: Vec<u32> = loaded.index.vector(1).unwrap().iter().map(|v| v.to_bits()).collect();
    assert_eq!(saved_bits, loaded_bits);
  }

  #[test]
  fn test_unbuilt_index_is_not_saved() {
    let temp = TempDir::new().unwrap();
    let file = IndexFile::new("m", 0, FlatIndex::new(4));
    assert_eq!(save_index(&file, &temp.path().join("i.bin")).unwrap_err().key(), "not_ready");
  }

  #[test]
  fn test_flipped_byte_fails_checksum() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.bin");
    save_index(&sample(), &path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[10] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let err = load_index(&path).unwrap_err();
    assert_eq!(err.key(), "io_failure");
    assert!(err.to_string().contains("CRC32 mismatch"));
  }

  #[test]
  fn test_zero_dimension_blob_with_valid_checksum_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.bin");
    let degenerate = FlatIndex { dimension: 0, vectors: Vec::new(), rows: 4, built: true };
    save_index(&IndexFile::new("m", 7, degenerate), &path).unwrap();

    let err = load_index(&path).unwrap_err();
    assert_eq!(err.key(), "io_failure");
    assert!(err.to_string().contains("dimension 0"));
  }

  #[test]
  fn test_truncated_blob_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.bin");
    std::fs::write(&path, b"CIX1").unwrap();

    assert_eq!(load_index(&path).unwrap_err().key(), "io_failure");
  }
}
