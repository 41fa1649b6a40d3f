//! Batch driver for the GHG emissions calculator.
//!
//! Reads activity events from JSON-lines input, calculates their emissions
//! against a [`ghg_core::store::FactorStore`] and emits the results, with
//! per-event retry, timeouts and rejection reporting. The `ghg` binary wires
//! this to the SQLite store and the configuration file.

pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;

pub use config::CalculatorConfig;
pub use error::{Error, EventError, Result};
pub use pipeline::{Driver, RetryPolicy, RunSummary};
