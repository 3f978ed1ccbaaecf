use thiserror::Error;

/// Failure taxonomy shared by the offline builders and the serving side.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConciergeError {
  #[error("{resource} is not loaded yet")]
  NotReady { resource: String },

  #[error("Invalid input: {message}")]
  InvalidInput { message: String },

  /// Only reachable when the index and record store have drifted apart.
  #[error("Record {index} not found (store holds {len} records)")]
  RecordNotFound { index: usize, len: usize },

  #[error("Invalid type")]
  InvalidAnalysisType { requested: String },

  #[error("I/O failure: {message}")]
  IoFailure { message: String },

  #[error("Build failed: {message}")]
  BuildFailure { message: String },
}

pub type Result<T> = std::result::Result<T, ConciergeError>;

impl ConciergeError {
  pub fn not_ready(resource: impl Into<String>) -> Self {
    Self::NotReady { resource: resource.into() }
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput { message: message.into() }
  }

  pub fn record_not_found(index: usize, len: usize) -> Self {
    Self::RecordNotFound { index, len }
  }

  pub fn invalid_analysis_type(requested: impl Into<String>) -> Self {
    Self::InvalidAnalysisType { requested: requested.into() }
  }

  pub fn io_failure(message: impl Into<String>) -> Self {
    Self::IoFailure { message: message.into() }
  }

  pub fn build_failure(message: impl Into<String>) -> Self {
    Self::BuildFailure { message: message.into() }
  }

  /// Stable machine-readable key, used in API error bodies
  pub fn key(&self) -> &'static str {
    match self {
      Self::NotReady { .. } => "not_ready",
      Self::InvalidInput { .. } => "invalid_input",
      Self::RecordNotFound { .. } => "record_not_found",
      Self::InvalidAnalysisType { .. } => "invalid_analysis_type",
      Self::IoFailure { .. } => "io_failure",
      Self::BuildFailure { .. } => "build_failure",
    }
  }
}

impl From<std::io::Error> for ConciergeError {
  fn from(err: std::io::Error) -> Self {
    Self::io_failure(err.to_string())
  }
}

impl From<csv::Error> for ConciergeError {
  fn from(err: csv::Error) -> Self {
    Self::io_failure(format!("snapshot: {err}"))
  }
}

impl From<serde_json::Error> for ConciergeError {
  fn from(err: serde_json::Error) -> Self {
    Self::io_failure(format!("json: {err}"))
  }
}

impl From<bincode::Error> for ConciergeError {
  fn from(err: bincode::Error) -> Self {
    Self::io_failure(format!("index blob: {err}"))
  }
}
