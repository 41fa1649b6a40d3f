//! Result emitter: persists calculated emissions to an [`EmissionStore`].
//!
//! Writes are keyed by `activity_event_id`, so emitting the same result twice
//! overwrites rather than duplicates. The emitter never retries or buffers; a
//! failed write is returned immediately for the driver to back off on.

use tracing::debug;

use crate::{EmitError, emission::CalculatedEmission, store::EmissionStore};

pub struct Emitter<'a, S> {
  store: &'a S,
}

impl<'a, S: EmissionStore> Emitter<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  pub async fn emit(&self, result: &CalculatedEmission) -> Result<(), EmitError> {
    self
      .store
      .put_emission(result)
      .await
      .map_err(|e| EmitError::Store(Box::new(e)))?;
    debug!(event = %result.activity_event_id(), "emitted calculated emission");
    Ok(())
  }
}
