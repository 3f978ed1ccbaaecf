//! Text-to-vector encoders.
//!
//! Two backends implement [`EmbeddingEncoder`]: the ONNX sentence-transformer
//! (behind the `neural` feature) and a deterministic feature-hashing encoder
//! that needs no model download.

pub mod hashing;
#[cfg(feature = "neural")]
pub mod onnx;

use std::sync::Arc;

use crate::config::{EncoderBackend, EncoderSettings};
use crate::error::{ConciergeError, Result};

pub use hashing::HashingEncoder;
#[cfg(feature = "neural")]
pub use onnx::OnnxEncoder;

/// Deterministic text encoder. Implementations serialize internally if the
/// underlying model cannot run concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait EmbeddingEncoder: Send + Sync {
  /// Identifier of the model version; persisted with every index
  fn model_id(&self) -> String;

  fn dimension(&self) -> usize;

  fn encode(&self, text: &str) -> Result<Vec<f32>>;

  /// Bulk variant used at build time; equivalent to mapping `encode`
  fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    texts.iter().map(|text| self.encode(text)).collect()
  }
}

/// Reject empty or whitespace-only text
pub fn validate_text(text: &str) -> Result<()> {
  if text.trim().is_empty() {
    return Err(ConciergeError::invalid_input("text to encode must not be empty"));
  }
  Ok(())
}

/// Scale a vector to unit L2 length; zero vectors are returned unchanged
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
  let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
  if magnitude > f32::EPSILON {
    for value in vector.iter_mut() {
      *value /= magnitude;
    }
  }
  vector
}

/// Construct the configured encoder
pub async fn create_encoder(settings: &EncoderSettings) -> Result<Arc<dyn EmbeddingEncoder>> {
  match settings.backend {
    EncoderBackend::Hashing => Ok(Arc::new(HashingEncoder::new(settings.hashing_dimension)?)),
    #[cfg(feature = "neural")]
    EncoderBackend::Onnx => Ok(Arc::new(OnnxEncoder::load(settings).await?)),
    #[cfg(not(feature = "neural"))]
    EncoderBackend::Onnx => Err(ConciergeError::invalid_input(
      "the onnx encoder backend requires building with the `neural` feature",
    )),
  }
}
