//! Error types for `ghg-calculator`.

use ghg_core::{CalculationError, EmitError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid configuration: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why one event produced no emission row.
#[derive(Debug, Error)]
pub enum EventError {
  #[error(transparent)]
  Calculation(#[from] CalculationError),

  #[error(transparent)]
  Emit(#[from] EmitError),
}

impl EventError {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Calculation(e) => e.kind(),
      Self::Emit(e) => e.kind(),
    }
  }

  /// Store failures and timeouts may succeed on another attempt; data
  /// problems never will.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Calculation(e) => e.is_retryable(),
      Self::Emit(_) => true,
    }
  }
}
