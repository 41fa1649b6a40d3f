//! SQLite backend for the GHG calculator.
//!
//! Implements both the factor lookup store and the calculated-emissions
//! output store over one database file. Wraps [`tokio_rusqlite`] so all
//! database access runs on a dedicated thread without blocking the async
//! runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
