use hf_hub::api::tokio::Api;
use ndarray::Array2;
use ort::{
  session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
  value::Tensor,
};
use std::path::PathBuf;
use std::sync::Mutex;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::EncoderSettings;
use crate::embedding::{normalize, validate_text, EmbeddingEncoder};
use crate::error::{ConciergeError, Result};

const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_FILE: &str = "onnx/model.onnx";

fn model_error(context: &str, err: impl std::fmt::Display) -> ConciergeError {
  ConciergeError::io_failure(format!("{context}: {err}"))
}

/// Sentence-transformer encoder running on ONNX Runtime.
///
/// Output is the attention-masked mean of the last hidden state, L2-normalized,
/// which is the published pooling pipeline for the MiniLM sentence models.
///
/// Batches are encoded one text at a time. Padding a text to a longer
/// neighbour changes the last bits of its pooled vector, and the index relies
/// on a record's stored vector being bit-identical to encoding its sentence.
pub struct OnnxEncoder {
  session: Mutex<Session>,
  tokenizer: Tokenizer,
  model_id: String,
  dimension: usize,
}

struct ModelFiles {
  tokenizer_file: PathBuf,
  model_path: PathBuf,
}

/// Token ids, attention mask and type ids flattened as [batch, length]
struct TokenBatch {
  ids: Vec<i64>,
  mask: Vec<i64>,
  type_ids: Vec<i64>,
  batch: usize,
  length: usize,
}

// Model initialization
#[cfg(not(tarpaulin_include))]
impl OnnxEncoder {
  /// Download (or reuse the hub cache of) the configured model and load it
  pub async fn load(settings: &EncoderSettings) -> Result<Self> {
    info!("Loading embedding model {}", settings.model);

    let files = Self::download_model(&settings.model).await?;
    let tokenizer = Self::load_tokenizer(&files.tokenizer_file, settings.max_length)?;
    let session = Self::load_session(&files.model_path)?;

    let mut encoder =
      Self { session: Mutex::new(session), tokenizer, model_id: settings.model.clone(), dimension: 0 };
    encoder.dimension = encoder.encode_text("booking dimension check")?.len();

    info!("Embedding model ready ({}-dimensional)", encoder.dimension);
    Ok(encoder)
  }

  async fn download_model(model: &str) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| model_error("HF API initialization failed", e))?;
    let repo = api.model(model.to_string());

    let tokenizer_file =
      repo.get(TOKENIZER_FILE).await.map_err(|e| model_error("Failed to download tokenizer", e))?;
    let model_path =
      repo.get(MODEL_FILE).await.map_err(|e| model_error("Failed to download ONNX model", e))?;

    Ok(ModelFiles { tokenizer_file, model_path })
  }

  fn load_tokenizer(path: &std::path::Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer =
      Tokenizer::from_file(path).map_err(|e| model_error("Failed to load tokenizer", e))?;

    tokenizer
      .with_truncation(Some(TruncationParams { max_length, ..Default::default() }))
      .map_err(|e| model_error("Failed to configure truncation", e))?;
    tokenizer.with_padding(Some(PaddingParams::default()));

    Ok(tokenizer)
  }

  fn load_session(model_path: &std::path::Path) -> Result<Session> {
    Session::builder()
      .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level1))
      .and_then(|builder| builder.commit_from_file(model_path))
      .map_err(|e| model_error("Failed to load ONNX model", e))
  }
}

// Inference
impl OnnxEncoder {
  #[cfg(not(tarpaulin_include))]
  fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
    let encoding =
      self.tokenizer.encode(text, true).map_err(|e| model_error("Failed to tokenize text", e))?;
    let tokens = batch_tokens(&[encoding]);

    let (batch, length) = (tokens.batch, tokens.length);
    let ids = to_tensor(tokens.ids, batch, length)?;
    let mask = to_tensor(tokens.mask.clone(), batch, length)?;
    let type_ids = to_tensor(tokens.type_ids, batch, length)?;

    // The session needs exclusive access for each run
    let mut session =
      self.session.lock().map_err(|_| ConciergeError::io_failure("embedding session poisoned"))?;
    let outputs = session
      .run(ort::inputs![
        "input_ids" => ids,
        "attention_mask" => mask,
        "token_type_ids" => type_ids
      ])
      .map_err(|e| model_error("Embedding inference failed", e))?;

    let (dims, data) = hidden_state(&outputs)?;
    debug!("Encoded text ({:?})", dims);
    mean_pool(&dims, data, &tokens.mask)?
      .pop()
      .ok_or_else(|| ConciergeError::io_failure("model returned no embedding"))
  }
}

#[cfg(not(tarpaulin_include))]
fn to_tensor(values: Vec<i64>, batch: usize, length: usize) -> Result<Tensor<i64>> {
  let array = Array2::from_shape_vec((batch, length), values)
    .map_err(|e| model_error("Invalid token batch shape", e))?;
  Tensor::from_array(array).map_err(|e| model_error("Failed to build input tensor", e))
}

#[cfg(not(tarpaulin_include))]
fn hidden_state<'a>(outputs: &'a SessionOutputs<'_>) -> Result<(Vec<i64>, &'a [f32])> {
  let output = outputs
    .get("last_hidden_state")
    .or_else(|| outputs.get("token_embeddings"))
    .ok_or_else(|| {
      ConciergeError::io_failure(format!(
        "No output tensor found - available outputs: {:?}",
        outputs.keys().collect::<Vec<_>>()
      ))
    })?;

  let (shape, data) =
    output.try_extract_tensor::<f32>().map_err(|e| model_error("Unexpected output tensor", e))?;
  let dims: &[i64] = shape.as_ref();
  Ok((dims.to_vec(), data))
}

fn batch_tokens(encodings: &[tokenizers::Encoding]) -> TokenBatch {
  let batch = encodings.len();
  let length = encodings.iter().map(|e| e.len()).max().unwrap_or(0);

  let mut tokens = TokenBatch {
    ids: Vec::with_capacity(batch * length),
    mask: Vec::with_capacity(batch * length),
    type_ids: Vec::with_capacity(batch * length),
    batch,
    length,
  };

  for encoding in encodings {
    let ids = encoding.get_ids();
    let mask = encoding.get_attention_mask();
    for i in 0..length {
      tokens.ids.push(ids.get(i).map_or(0, |&id| i64::from(id)));
      tokens.mask.push(mask.get(i).map_or(0, |&m| i64::from(m)));
      tokens.type_ids.push(0);
    }
  }

  tokens
}

/// Average the token states whose mask is set, then normalize each row
fn mean_pool(dims: &[i64], data: &[f32], mask: &[i64]) -> Result<Vec<Vec<f32>>> {
  let [batch, seq_len, hidden] = match dims {
    [b, s, h] => [*b as usize, *s as usize, *h as usize],
    _ => {
      return Err(ConciergeError::io_failure(format!(
        "expected a [batch, sequence, hidden] output, got {dims:?}"
      )))
    }
  };

  if data.len() != batch * seq_len * hidden || mask.len() != batch * seq_len {
    return Err(ConciergeError::io_failure("model output does not match the input batch"));
  }

  let pooled = (0..batch)
    .map(|b| {
      let mut sum = vec![0.0f32; hidden];
      let mut count = 0.0f32;
      for t in 0..seq_len {
        if mask[b * seq_len + t] == 0 {
          continue;
        }
        let start = (b * seq_len + t) * hidden;
        for (acc, value) in sum.iter_mut().zip(&data[start..start + hidden]) {
          *acc += value;
        }
        count += 1.0;
      }
      if count > 0.0 {
        sum.iter_mut().for_each(|v| *v /= count);
      }
      normalize(sum)
    })
    .collect();

  Ok(pooled)
}

impl EmbeddingEncoder for OnnxEncoder {
  fn model_id(&self) -> String {
    self.model_id.clone()
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn encode(&self, text: &str) -> Result<Vec<f32>> {
    validate_text(text)?;
    self.encode_text(text)
  }
}
