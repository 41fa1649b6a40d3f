//! Reference data loader.
//!
//! A load converts the curated dataset into typed records, rejects it outright
//! if any key repeats, then writes it to a [`FactorStore`] in batches of at
//! most [`MAX_BATCH_ITEMS`]. Nothing is written unless every record is valid
//! and unique. Writes are upserts, so re-running a load is harmless.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  LoadError,
  factor::{EmissionFactorRecord, FactorKey, RawFactorRecord},
  store::{FactorStore, MAX_BATCH_ITEMS},
};

// ─── Types ───────────────────────────────────────────────────────────────────

/// What happens to stored factors that the new dataset no longer contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
  /// Keep them.
  #[default]
  Upsert,
  /// Delete them once every batch of the new dataset has been written.
  Replace,
}

impl LoadMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Upsert => "upsert",
      Self::Replace => "replace",
    }
  }
}

/// A record of one completed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadManifest {
  pub load_id:         Uuid,
  /// Hex SHA-256 of the validated dataset; identical input gives an
  /// identical version regardless of record order.
  pub dataset_version: String,
  pub record_count:    u64,
  pub batch_count:     u64,
  pub mode:            LoadMode,
  pub loaded_at:       DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
  pub manifest: LoadManifest,
  /// Factors removed by a [`LoadMode::Replace`] load.
  pub pruned:   u64,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Parse the reference dataset document (a JSON array of records).
pub fn parse_dataset(json: &str) -> Result<Vec<RawFactorRecord>, LoadError> {
  Ok(serde_json::from_str(json)?)
}

/// Fail with every key that occurs more than once.
pub fn check_duplicates(raw: &[RawFactorRecord]) -> Result<(), LoadError> {
  let mut seen = HashSet::with_capacity(raw.len());
  let mut duplicates = BTreeSet::new();
  for record in raw {
    let key = record.key();
    if !seen.insert(key.clone()) {
      duplicates.insert(key.to_string());
    }
  }

  if duplicates.is_empty() {
    Ok(())
  } else {
    Err(LoadError::DuplicateFactor { keys: duplicates.into_iter().collect() })
  }
}

/// Validate and convert the whole dataset. Either every record converts or
/// the first failure is returned.
pub fn prepare(raw: Vec<RawFactorRecord>) -> Result<Vec<EmissionFactorRecord>, LoadError> {
  check_duplicates(&raw)?;

  raw
    .into_iter()
    .enumerate()
    .map(|(index, record)| {
      let key = record.key().to_string();
      if record.category.trim().is_empty() || record.activity.trim().is_empty() {
        return Err(LoadError::InvalidRecord {
          index,
          key,
          reason: "category and activity must not be empty".into(),
        });
      }
      record.into_record().map_err(|e| LoadError::InvalidRecord {
        index,
        key,
        reason: e.to_string(),
      })
    })
    .collect()
}

/// Content hash of a validated dataset, independent of record order.
pub fn dataset_version(records: &[EmissionFactorRecord]) -> Result<String, LoadError> {
  let mut sorted: Vec<&EmissionFactorRecord> = records.iter().collect();
  sorted.sort_by(|a, b| a.key.cmp(&b.key));

  let mut hasher = Sha256::new();
  for record in sorted {
    hasher.update(serde_json::to_vec(record)?);
    hasher.update(b"\n");
  }
  Ok(hex::encode(hasher.finalize()))
}

// ─── Load ────────────────────────────────────────────────────────────────────

fn store_error<E>(e: E) -> LoadError
where
  E: std::error::Error + Send + Sync + 'static,
{
  LoadError::Store(Box::new(e))
}

/// Validate `raw` and write it to `store`.
///
/// Issues exactly ⌈N/[`MAX_BATCH_ITEMS`]⌉ `put_factors` calls. Validation
/// failures return before the first call.
pub async fn load<S: FactorStore>(
  store: &S,
  raw: Vec<RawFactorRecord>,
  mode: LoadMode,
) -> Result<LoadReport, LoadError> {
  let records = prepare(raw)?;
  let version = dataset_version(&records)?;

  let mut batch_count = 0_u64;
  for (index, batch) in records.chunks(MAX_BATCH_ITEMS).enumerate() {
    store.put_factors(batch).await.map_err(store_error)?;
    batch_count += 1;
    debug!(batch = index, size = batch.len(), "wrote emission factor batch");
  }

  let pruned = match mode {
    LoadMode::Upsert => 0,
    LoadMode::Replace => {
      let keep: Vec<FactorKey> = records.iter().map(|r| r.key.clone()).collect();
      store.prune_factors(&keep).await.map_err(store_error)?
    }
  };

  let manifest = LoadManifest {
    load_id:         Uuid::new_v4(),
    dataset_version: version,
    record_count:    records.len() as u64,
    batch_count,
    mode,
    loaded_at:       Utc::now(),
  };
  store.record_load(&manifest).await.map_err(store_error)?;

  info!(
    load_id = %manifest.load_id,
    version = %manifest.dataset_version,
    records = manifest.record_count,
    batches = manifest.batch_count,
    pruned,
    mode = mode.as_str(),
    "loaded emission factors"
  );

  Ok(LoadReport { manifest, pruned })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{MemoryStore, raw_factor};

  fn dataset(n: usize) -> Vec<RawFactorRecord> {
    (0..n)
      .map(|i| raw_factor("stationary-combustion", &format!("fuel-{i}"), "2.5", "gallon"))
      .collect()
  }

  #[tokio::test]
  async fn batches_never_exceed_limit_and_cover_input_once() {
    for n in [0, 1, 24, 25, 26, 50, 51, 133] {
      let store = MemoryStore::default();
      let report = load(&store, dataset(n), LoadMode::Upsert).await.unwrap();

      let batches = store.batches();
      assert_eq!(batches.len(), n.div_ceil(MAX_BATCH_ITEMS), "n = {n}");
      assert_eq!(report.manifest.batch_count as usize, batches.len());
      assert!(batches.iter().all(|b| b.len() <= MAX_BATCH_ITEMS));

      let mut written: Vec<String> =
        batches.iter().flatten().map(|k| k.activity.clone()).collect();
      written.sort();
      let mut expected: Vec<String> = (0..n).map(|i| format!("fuel-{i}")).collect();
      expected.sort();
      assert_eq!(written, expected);
    }
  }

  #[tokio::test]
  async fn duplicate_keys_abort_before_any_write() {
    let store = MemoryStore::default();
    let mut raw = dataset(30);
    raw.push(raw_factor("stationary-combustion", "fuel-3", "9", "gallon"));
    raw.push(raw_factor("stationary-combustion", "fuel-17", "9", "gallon"));
    raw.push(raw_factor("stationary-combustion", "fuel-3", "9", "gallon"));

    let err = load(&store, raw, LoadMode::Upsert).await.unwrap_err();
    assert_eq!(err.kind(), "duplicate_factor");
    match err {
      LoadError::DuplicateFactor { keys } => assert_eq!(
        keys,
        vec!["stationary-combustion_fuel-17", "stationary-combustion_fuel-3"]
      ),
      other => panic!("unexpected error: {other}"),
    }
    assert!(store.batches().is_empty());
    assert!(store.latest_manifest().is_none());
  }

  #[tokio::test]
  async fn invalid_record_aborts_before_any_write() {
    let store = MemoryStore::default();
    let mut raw = dataset(40);
    raw[33].emissions_factor_standards.ghg.coefficients.co2_factor = "n/a".into();

    let err = load(&store, raw, LoadMode::Upsert).await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidRecord { index: 33, .. }));
    assert_eq!(err.kind(), "invalid_factor");
    assert!(store.batches().is_empty());
  }

  #[tokio::test]
  async fn reload_is_idempotent() {
    let store = MemoryStore::default();
    let first = load(&store, dataset(30), LoadMode::Upsert).await.unwrap();
    let second = load(&store, dataset(30), LoadMode::Upsert).await.unwrap();

    assert_eq!(store.factor_count(), 30);
    assert_eq!(first.manifest.dataset_version, second.manifest.dataset_version);
    assert_ne!(first.manifest.load_id, second.manifest.load_id);
  }

  #[tokio::test]
  async fn replace_prunes_keys_missing_from_new_dataset() {
    let store = MemoryStore::default();
    load(&store, dataset(10), LoadMode::Upsert).await.unwrap();

    let upsert = load(&store, dataset(4), LoadMode::Upsert).await.unwrap();
    assert_eq!(upsert.pruned, 0);
    assert_eq!(store.factor_count(), 10);

    let replace = load(&store, dataset(4), LoadMode::Replace).await.unwrap();
    assert_eq!(replace.pruned, 6);
    assert_eq!(store.factor_count(), 4);
  }

  #[test]
  fn version_ignores_record_order() {
    let forward = prepare(dataset(5)).unwrap();
    let mut backward = forward.clone();
    backward.reverse();
    assert_eq!(dataset_version(&forward).unwrap(), dataset_version(&backward).unwrap());

    let changed = prepare(vec![raw_factor("stationary-combustion", "fuel-0", "2.6", "gallon")])
      .unwrap();
    let original = prepare(dataset(1)).unwrap();
    assert_ne!(dataset_version(&changed).unwrap(), dataset_version(&original).unwrap());
  }

  #[test]
  fn parse_dataset_reads_document_array() {
    let doc = r#"[{
      "category": "grid-region-location-based",
      "activity": "Quebec",
      "scope": 2,
      "emissions_factor_standards": { "ghg": { "coefficients": {
        "co2_factor": "0.0012", "ch4_factor": "", "n2o_factor": "0.0000001",
        "biofuel_co2": "", "AR4-kgco2e": "0.0012298", "AR5-kgco2e": "0.0012265",
        "units": "kwh" }, "last_updated": "", "source": "eGRID", "source_origin": "EPA" } }
    }]"#;
    let raw = parse_dataset(doc).unwrap();
    assert_eq!(raw.len(), 1);
    let records = prepare(raw).unwrap();
    assert_eq!(records[0].ghg.coefficients.ch4_factor, None);
  }

  #[test]
  fn non_array_document_is_malformed() {
    let err = parse_dataset(r#"{"category": "x"}"#).unwrap_err();
    assert!(matches!(err, LoadError::Document(_)));
    assert_eq!(err.kind(), "malformed_dataset");
  }

  #[test]
  fn empty_category_is_invalid() {
    let err = prepare(vec![raw_factor(" ", "diesel", "1", "gallon")]).unwrap_err();
    assert!(matches!(err, LoadError::InvalidRecord { index: 0, .. }));
  }
}
