//! Store traits for reference data and calculated output.
//!
//! Implemented by storage backends (e.g. `ghg-store-sqlite`). The loader,
//! engine and emitter depend on these abstractions, not on a concrete
//! backend.

use std::future::Future;

use crate::{
  emission::{CalculatedEmission, Rejection},
  factor::{EmissionFactorRecord, FactorKey},
  loader::LoadManifest,
};

/// Maximum number of records accepted by one [`FactorStore::put_factors`]
/// call. Mirrors the per-request item limit of the key-value stores this
/// data is deployed to.
pub const MAX_BATCH_ITEMS: usize = 25;

// ─── Factor lookup ───────────────────────────────────────────────────────────

/// Read-optimised mapping from [`FactorKey`] to [`EmissionFactorRecord`].
///
/// The calculation path only calls [`get_factor`](Self::get_factor). Writes
/// happen through the loader during a refresh, which the operator must not
/// run concurrently with another refresh.
pub trait FactorStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the factor for `key`. Returns `None` if there is none.
  fn get_factor<'a>(
    &'a self,
    key: &'a FactorKey,
  ) -> impl Future<Output = Result<Option<EmissionFactorRecord>, Self::Error>> + Send + 'a;

  /// Upsert up to [`MAX_BATCH_ITEMS`] records atomically: either every
  /// record in the batch is written or none is. Larger batches are an error.
  fn put_factors<'a>(
    &'a self,
    batch: &'a [EmissionFactorRecord],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete every factor whose key is not in `keep`. Returns the number of
  /// records removed.
  fn prune_factors<'a>(
    &'a self,
    keep: &'a [FactorKey],
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  fn count_factors(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Record a completed load.
  fn record_load<'a>(
    &'a self,
    manifest: &'a LoadManifest,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The most recently recorded load, if any.
  fn latest_load(
    &self,
  ) -> impl Future<Output = Result<Option<LoadManifest>, Self::Error>> + Send + '_;
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Durable output for calculated emissions and rejected events.
pub trait EmissionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Write `emission` keyed by its `activity_event_id`, replacing any
  /// existing row for that id.
  fn put_emission<'a>(
    &'a self,
    emission: &'a CalculatedEmission,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_emission<'a>(
    &'a self,
    activity_event_id: &'a str,
  ) -> impl Future<Output = Result<Option<CalculatedEmission>, Self::Error>> + Send + 'a;

  fn count_emissions(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Append a rejection report.
  fn record_rejection<'a>(
    &'a self,
    rejection: &'a Rejection,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_rejections(
    &self,
    run_id: uuid::Uuid,
  ) -> impl Future<Output = Result<Vec<Rejection>, Self::Error>> + Send + '_;
}
