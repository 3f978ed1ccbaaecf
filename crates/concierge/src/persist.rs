//! Shared helpers for the on-disk artifacts (snapshot, index blob, analytics cache).

use std::fs;
use std::path::Path;

use crate::error::{ConciergeError, Result};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Write `bytes` to `path` through a sibling temp file and a rename, so readers
/// never observe a half-written artifact.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| {
      ConciergeError::io_failure(format!("failed to create {}: {e}", parent.display()))
    })?;
  }

  let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  tmp_name.push(".tmp");
  let tmp_path = path.with_file_name(tmp_name);

  fs::write(&tmp_path, bytes)
    .map_err(|e| ConciergeError::io_failure(format!("failed to write {}: {e}", tmp_path.display())))?;
  fs::rename(&tmp_path, path)
    .map_err(|e| ConciergeError::io_failure(format!("failed to replace {}: {e}", path.display())))?;

  Ok(())
}

/// Read a whole artifact, naming the path in the error
pub fn read_artifact(path: &Path) -> Result<Vec<u8>> {
  fs::read(path)
    .map_err(|e| ConciergeError::io_failure(format!("failed to read {}: {e}", path.display())))
}

/// 64-bit FNV-1a over a sequence of byte strings, each terminated by 0xff.
pub fn fnv1a<'a, I>(parts: I) -> u64
where
  I: IntoIterator<Item = &'a [u8]>,
{
  let mut hash = FNV_OFFSET_BASIS;
  for part in parts {
    for &byte in part.iter().chain(std::iter::once(&0xff)) {
      hash ^= u64::from(byte);
      hash = hash.wrapping_mul(FNV_PRIME);
    }
  }
  hash
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_write_atomically_creates_parents_and_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nested").join("artifact.bin");

    write_atomically(&target, b"payload").unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"payload");
    assert!(!temp.path().join("nested").join("artifact.bin.tmp").exists());
  }

  #[test]
  fn test_read_artifact_missing_file_is_io_failure() {
    let temp = TempDir::new().unwrap();
    let err = read_artifact(&temp.path().join("absent.json")).unwrap_err();
    assert_eq!(err.key(), "io_failure");
    assert!(err.to_string().contains("absent.json"));
  }

  #[test]
  fn test_fnv1a_separates_parts() {
    let joined = fnv1a([b"ab".as_slice(), b"c".as_slice()]);
    let split = fnv1a([b"a".as_slice(), b"bc".as_slice()]);
    assert_ne!(joined, split);
    assert_eq!(joined, fnv1a([b"ab".as_slice(), b"c".as_slice()]));
  }
}
