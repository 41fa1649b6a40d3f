//! Error type for `ghg-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ghg_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value the domain types cannot represent.
  #[error("corrupt column {column}: {value:?}")]
  Corrupt { column: &'static str, value: String },

  /// A factor batch larger than the store accepts in one write.
  #[error("batch of {0} records exceeds the limit of {limit}", limit = ghg_core::store::MAX_BATCH_ITEMS)]
  BatchTooLarge(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
