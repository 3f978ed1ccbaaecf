use crate::embedding::{normalize, validate_text, EmbeddingEncoder};
use crate::error::{ConciergeError, Result};
use crate::persist::fnv1a;

/// Feature-hashing encoder: lowercased word unigrams and bigrams are hashed
/// into signed buckets and the result is L2-normalized.
///
/// It carries no semantics beyond shared vocabulary, but it is deterministic,
/// offline, and cheap, which makes it the backend for tests and model-free
/// deployments.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
  dimension: usize,
}

impl HashingEncoder {
  pub fn new(dimension: usize) -> Result<Self> {
    if dimension == 0 {
      return Err(ConciergeError::invalid_input("hashing dimension must be positive"));
    }
    Ok(Self { dimension })
  }

  fn tokens(text: &str) -> Vec<String> {
    text
      .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '-')
      .map(|token| token.trim_matches(|c: char| c == '.' || c == '-').to_lowercase())
      .filter(|token| !token.is_empty())
      .collect()
  }

  fn accumulate(&self, vector: &mut [f32], feature: &str) {
    let hash = fnv1a([feature.as_bytes()]);
    let bucket = (hash % self.dimension as u64) as usize;
    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign;
  }
}

impl EmbeddingEncoder for HashingEncoder {
  fn model_id(&self) -> String {
    format!("hashing-v1-{}", self.dimension)
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn encode(&self, text: &str) -> Result<Vec<f32>> {
    validate_text(text)?;

    let tokens = Self::tokens(text);
    let mut vector = vec![0.0f32; self.dimension];

    for token in &tokens {
      self.accumulate(&mut vector, token);
    }
    for pair in tokens.windows(2) {
      self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]));
    }

    Ok(normalize(vector))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
  }

  #[test]
  fn test_zero_dimension_rejected() {
    assert!(HashingEncoder::new(0).is_err());
  }

  #[test]
  fn test_encode_is_deterministic() {
    let encoder = HashingEncoder::new(64).unwrap();
    let text = "Booking in City Hotel on 2015-07-01 by guest from PRT. Price: 98.5€, Canceled: False";

    let first = encoder.encode(text).unwrap();
    let second = encoder.encode(text).unwrap();

    assert_eq!(first.len(), 64);
    assert_eq!(first, second);
  }

  #[test]
  fn test_empty_text_is_invalid_input() {
    let encoder = HashingEncoder::new(16).unwrap();
    assert_eq!(encoder.encode("").unwrap_err().key(), "invalid_input");
  }

  #[test]
  fn test_shared_vocabulary_is_closer() {
    let encoder = HashingEncoder::new(256).unwrap();
    let query = encoder.encode("resort hotel guest from portugal").unwrap();
    let near = encoder.encode("booking at the resort hotel by a guest from portugal").unwrap();
    let far = encoder.encode("city apartment cancelled in winter").unwrap();

    assert!(squared_distance(&query, &near) < squared_distance(&query, &far));
  }

  #[test]
  fn test_case_and_punctuation_insensitive() {
    let encoder = HashingEncoder::new(128).unwrap();
    assert_eq!(encoder.encode("City Hotel, PRT!").unwrap(), encoder.encode("city hotel prt").unwrap());
  }
}
