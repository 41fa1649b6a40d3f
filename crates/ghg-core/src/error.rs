//! Error types for `ghg-core`.
//!
//! [`Error`] covers boundary parsing (decimals, scopes, timestamps). The
//! component errors ([`LoadError`], [`CalculationError`], [`EmitError`])
//! carry a stable [`kind`](CalculationError::kind) code used when rejected
//! events are reported for triage.

use thiserror::Error;

/// A boxed storage-backend error. Backends define their own error types; the
/// engine only needs to display and propagate them.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid decimal {0:?}")]
  InvalidDecimal(String),

  #[error("invalid scope {0:?}: expected 1, 2 or 3")]
  InvalidScope(String),

  #[error("invalid timestamp {0:?}")]
  InvalidTimestamp(String),

  #[error("invalid date {0:?}")]
  InvalidDate(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Load ────────────────────────────────────────────────────────────────────

/// Failure of a reference-data load. Any of these aborts the whole load.
#[derive(Debug, Error)]
pub enum LoadError {
  /// Two or more records share a `category_activity` key. Raised before any
  /// write reaches the store.
  #[error("duplicates found in emission factors: {}", keys.join(", "))]
  DuplicateFactor { keys: Vec<String> },

  /// A record could not be converted from its raw document form.
  #[error("invalid emission factor #{index} ({key}): {reason}")]
  InvalidRecord {
    index:  usize,
    key:    String,
    reason: String,
  },

  #[error("malformed reference dataset: {0}")]
  Document(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] StoreError),
}

impl LoadError {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::DuplicateFactor { .. } => "duplicate_factor",
      Self::InvalidRecord { .. } => "invalid_factor",
      Self::Document(_) => "malformed_dataset",
      Self::Store(_) => "store_failed",
    }
  }
}

// ─── Calculation ─────────────────────────────────────────────────────────────

/// Per-event calculation failure. Never aborts the batch the event belongs to.
#[derive(Debug, Error)]
pub enum CalculationError {
  #[error("no emission factor for category {category:?}, activity {activity:?}")]
  UnresolvedFactor { category: String, activity: String },

  #[error("event unit {event_unit:?} is incompatible with factor unit {factor_unit:?}")]
  UnitMismatch {
    event_unit:  String,
    factor_unit: String,
  },

  #[error("emission factor {key} is incomplete: {missing}")]
  IncompleteFactor { key: String, missing: String },

  #[error("{field} = {value} does not fit DECIMAL(32,16)")]
  PrecisionOverflow { field: &'static str, value: String },

  #[error("factor lookup failed: {0}")]
  Lookup(#[source] StoreError),

  #[error("factor lookup timed out")]
  Timeout,
}

impl CalculationError {
  /// Stable snake_case code for triage reports.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::UnresolvedFactor { .. } => "unresolved_factor",
      Self::UnitMismatch { .. } => "unit_mismatch",
      Self::IncompleteFactor { .. } => "incomplete_factor",
      Self::PrecisionOverflow { .. } => "precision_overflow",
      Self::Lookup(_) => "lookup_failed",
      Self::Timeout => "timeout",
    }
  }

  /// Whether the caller may retry the same event and expect a different
  /// outcome. Data errors are final; I/O errors are not.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Lookup(_) | Self::Timeout)
  }
}

// ─── Emit ────────────────────────────────────────────────────────────────────

/// Failure to persist a calculated emission. Always retryable by the caller;
/// the emitter itself never retries.
#[derive(Debug, Error)]
pub enum EmitError {
  #[error("emission store error: {0}")]
  Store(#[source] StoreError),

  #[error("emission write timed out")]
  Timeout,
}

impl EmitError {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Store(_) => "emit_failed",
      Self::Timeout => "timeout",
    }
  }
}
