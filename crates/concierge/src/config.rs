//! Configuration for the builders, the CLI and the server.
//!
//! Everything lives under one root directory (`CONCIERGE_ROOT`, else
//! `~/.concierge`). An optional `config.json` there overrides the defaults;
//! relative paths in it resolve against the root.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConciergeError, Result};

pub const ROOT_ENV: &str = "CONCIERGE_ROOT";
pub const ENCODER_ENV: &str = "CONCIERGE_ENCODER";
pub const CONFIG_FILE: &str = "config.json";

/// Which encoder implementation produces embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
  /// Sentence-transformer model on ONNX Runtime
  Onnx,
  /// Deterministic feature hashing, no model download
  Hashing,
}

impl std::fmt::Display for EncoderBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Onnx => write!(f, "onnx"),
      Self::Hashing => write!(f, "hashing"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
  #[serde(default = "default_backend")]
  pub backend: EncoderBackend,
  /// Hugging Face repository of the ONNX model
  #[serde(default = "default_model")]
  pub model: String,
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,
  /// Tokens beyond this are truncated
  #[serde(default = "default_max_length")]
  pub max_length: usize,
  #[serde(default = "default_hashing_dimension")]
  pub hashing_dimension: usize,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  #[serde(skip)]
  root: PathBuf,
  /// Raw booking export consumed by the builders
  #[serde(default = "default_dataset")]
  pub dataset: PathBuf,
  /// Normalized snapshot aligned with the index
  #[serde(default = "default_snapshot")]
  pub snapshot: PathBuf,
  #[serde(default = "default_index")]
  pub index: PathBuf,
  #[serde(default = "default_analytics")]
  pub analytics: PathBuf,
  #[serde(default = "default_history")]
  pub history: PathBuf,
  #[serde(default)]
  pub encoder: EncoderSettings,
  #[serde(default = "default_bind")]
  pub bind: String,
}

fn default_backend() -> EncoderBackend {
  if cfg!(feature = "neural") {
    EncoderBackend::Onnx
  } else {
    EncoderBackend::Hashing
  }
}
fn default_model() -> String {
  "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_batch_size() -> usize {
  32
}
fn default_max_length() -> usize {
  256
}
fn default_hashing_dimension() -> usize {
  384
}
fn default_dataset() -> PathBuf {
  PathBuf::from("bookings.csv")
}
fn default_snapshot() -> PathBuf {
  PathBuf::from("snapshot.csv")
}
fn default_index() -> PathBuf {
  PathBuf::from("index.bin")
}
fn default_analytics() -> PathBuf {
  PathBuf::from("analytics.json")
}
fn default_history() -> PathBuf {
  PathBuf::from("history.jsonl")
}
fn default_bind() -> String {
  "127.0.0.1:5000".to_string()
}

impl Default for EncoderSettings {
  fn default() -> Self {
    Self {
      backend: default_backend(),
      model: default_model(),
      batch_size: default_batch_size(),
      max_length: default_max_length(),
      hashing_dimension: default_hashing_dimension(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      root: PathBuf::new(),
      dataset: default_dataset(),
      snapshot: default_snapshot(),
      index: default_index(),
      analytics: default_analytics(),
      history: default_history(),
      encoder: EncoderSettings::default(),
      bind: default_bind(),
    }
  }
}

impl Config {
  /// Root directory from `CONCIERGE_ROOT`, falling back to `~/.concierge`
  pub fn root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(ROOT_ENV) {
      if !root.trim().is_empty() {
        return Ok(PathBuf::from(root));
      }
    }

    dirs::home_dir()
      .map(|home| home.join(".concierge"))
      .ok_or_else(|| ConciergeError::io_failure("could not determine the home directory"))
  }

  /// Load the configuration of the default root
  pub fn load() -> Result<Self> {
    Self::load_in(&Self::root()?)
  }

  /// Load `<root>/config.json` if present, otherwise defaults bound to `root`
  pub fn load_in(root: &Path) -> Result<Self> {
    let path = root.join(CONFIG_FILE);
    let config = if path.exists() { Self::load_from_file(&path)? } else { Self::default() };
    let mut config = config.with_root(root);

    if let Ok(backend) = std::env::var(ENCODER_ENV) {
      config.encoder.backend = EncoderBackend::from_str(&backend, true).map_err(|_| {
        ConciergeError::invalid_input(format!("{ENCODER_ENV}: unknown encoder backend '{backend}'"))
      })?;
    }

    Ok(config)
  }

  /// Parse a configuration file; paths stay relative until a root is attached
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
      ConciergeError::io_failure(format!("failed to read {}: {e}", path.as_ref().display()))
    })?;
    Ok(serde_json::from_str(&content)?)
  }

  /// Bind relative paths to `root` without reading anything from disk
  pub fn with_root(mut self, root: &Path) -> Self {
    self.root = root.to_path_buf();
    self
  }

  pub fn root_dir(&self) -> &Path {
    &self.root
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    // Absolute paths replace the root when joined
    self.root.join(path)
  }

  pub fn dataset_path(&self) -> PathBuf {
    self.resolve(&self.dataset)
  }

  pub fn snapshot_path(&self) -> PathBuf {
    self.resolve(&self.snapshot)
  }

  pub fn index_path(&self) -> PathBuf {
    self.resolve(&self.index)
  }

  pub fn analytics_path(&self) -> PathBuf {
    self.resolve(&self.analytics)
  }

  pub fn history_path(&self) -> PathBuf {
    self.resolve(&self.history)
  }
}
