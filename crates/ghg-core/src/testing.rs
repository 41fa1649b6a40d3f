//! In-memory store and fixtures shared by this crate's unit tests.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use uuid::Uuid;

use crate::{
  emission::{CalculatedEmission, Rejection},
  factor::{
    EmissionFactorRecord, FactorKey, RawCoefficients, RawFactorRecord, RawGhgStandard,
    RawScope, RawStandards,
  },
  loader::LoadManifest,
  store::{EmissionStore, FactorStore, MAX_BATCH_ITEMS},
};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
  #[error("batch of {0} exceeds the batch limit")]
  BatchTooLarge(usize),
  #[error("store unavailable")]
  Unavailable,
}

#[derive(Default)]
struct Inner {
  factors:    HashMap<FactorKey, EmissionFactorRecord>,
  batches:    Vec<Vec<FactorKey>>,
  manifests:  Vec<LoadManifest>,
  emissions:  HashMap<String, CalculatedEmission>,
  rejections: Vec<Rejection>,
  failing:    bool,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap() }

  pub fn with_factors(records: Vec<EmissionFactorRecord>) -> Self {
    let store = Self::default();
    store.lock().factors = records.into_iter().map(|r| (r.key.clone(), r)).collect();
    store
  }

  /// Make every subsequent call fail.
  pub fn fail(&self) { self.lock().failing = true; }

  pub fn batches(&self) -> Vec<Vec<FactorKey>> { self.lock().batches.clone() }

  pub fn factor_count(&self) -> usize { self.lock().factors.len() }

  pub fn latest_manifest(&self) -> Option<LoadManifest> { self.lock().manifests.last().cloned() }

  pub fn emission_count(&self) -> usize { self.lock().emissions.len() }

  fn check(&self) -> Result<MutexGuard<'_, Inner>, MemoryError> {
    let inner = self.lock();
    if inner.failing { Err(MemoryError::Unavailable) } else { Ok(inner) }
  }
}

impl FactorStore for MemoryStore {
  type Error = MemoryError;

  async fn get_factor(&self, key: &FactorKey) -> Result<Option<EmissionFactorRecord>, MemoryError> {
    Ok(self.check()?.factors.get(key).cloned())
  }

  async fn put_factors(&self, batch: &[EmissionFactorRecord]) -> Result<(), MemoryError> {
    if batch.len() > MAX_BATCH_ITEMS {
      return Err(MemoryError::BatchTooLarge(batch.len()));
    }
    let mut inner = self.check()?;
    inner.batches.push(batch.iter().map(|r| r.key.clone()).collect());
    for record in batch {
      inner.factors.insert(record.key.clone(), record.clone());
    }
    Ok(())
  }

  async fn prune_factors(&self, keep: &[FactorKey]) -> Result<u64, MemoryError> {
    let mut inner = self.check()?;
    let before = inner.factors.len();
    inner.factors.retain(|k, _| keep.contains(k));
    Ok((before - inner.factors.len()) as u64)
  }

  async fn count_factors(&self) -> Result<u64, MemoryError> {
    Ok(self.check()?.factors.len() as u64)
  }

  async fn record_load(&self, manifest: &LoadManifest) -> Result<(), MemoryError> {
    self.check()?.manifests.push(manifest.clone());
    Ok(())
  }

  async fn latest_load(&self) -> Result<Option<LoadManifest>, MemoryError> {
    Ok(self.check()?.manifests.last().cloned())
  }
}

impl EmissionStore for MemoryStore {
  type Error = MemoryError;

  async fn put_emission(&self, emission: &CalculatedEmission) -> Result<(), MemoryError> {
    self
      .check()?
      .emissions
      .insert(emission.activity_event_id().to_owned(), emission.clone());
    Ok(())
  }

  async fn get_emission(&self, id: &str) -> Result<Option<CalculatedEmission>, MemoryError> {
    Ok(self.check()?.emissions.get(id).cloned())
  }

  async fn count_emissions(&self) -> Result<u64, MemoryError> {
    Ok(self.check()?.emissions.len() as u64)
  }

  async fn record_rejection(&self, rejection: &Rejection) -> Result<(), MemoryError> {
    self.check()?.rejections.push(rejection.clone());
    Ok(())
  }

  async fn list_rejections(&self, run_id: Uuid) -> Result<Vec<Rejection>, MemoryError> {
    Ok(
      self
        .check()?
        .rejections
        .iter()
        .filter(|r| r.run_id == run_id)
        .cloned()
        .collect(),
    )
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn raw_factor(category: &str, activity: &str, co2: &str, units: &str) -> RawFactorRecord {
  RawFactorRecord {
    category:                   category.into(),
    activity:                   activity.into(),
    scope:                      RawScope::Number(1),
    emissions_factor_standards: RawStandards {
      ghg: RawGhgStandard {
        coefficients:  RawCoefficients {
          co2_factor:  co2.into(),
          ch4_factor:  String::new(),
          n2o_factor:  String::new(),
          biofuel_co2: String::new(),
          ar4_kgco2e:  co2.into(),
          ar5_kgco2e:  co2.into(),
          units:       units.into(),
        },
        last_updated:  "2022-05-22".into(),
        source:        "test".into(),
        source_origin: "fixture".into(),
      },
    },
  }
}
