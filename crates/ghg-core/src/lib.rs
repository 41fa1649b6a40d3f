//! Core types and logic for the GHG emissions calculator.
//!
//! This crate holds the reference-data loader, the multi-gas calculation
//! engine and the result emitter, plus the store traits they talk to. It has
//! no database, CLI or async-runtime dependencies; storage backends (e.g.
//! `ghg-store-sqlite`) implement the traits in [`store`].

pub mod calculate;
pub mod decimal;
pub mod emission;
pub mod emit;
pub mod error;
pub mod event;
pub mod factor;
pub mod gwp;
pub mod loader;
pub mod store;
pub mod units;

pub use error::{CalculationError, EmitError, Error, LoadError, Result};

#[cfg(test)]
mod testing;
