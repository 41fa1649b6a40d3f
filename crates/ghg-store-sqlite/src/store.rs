//! [`SqliteStore`] — the SQLite implementation of [`FactorStore`] and
//! [`EmissionStore`].

use std::{collections::HashSet, path::Path};

use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use ghg_core::{
  emission::{CalculatedEmission, Rejection},
  factor::{EmissionFactorRecord, FactorKey},
  loader::LoadManifest,
  store::{EmissionStore, FactorStore, MAX_BATCH_ITEMS},
};

use crate::{
  Error, Result,
  encode::{RawEmission, RawFactor, RawManifest, RawRejection, encode_dt, encode_uuid},
  schema::SCHEMA,
};

const FACTOR_COLUMNS: &str = "category, activity, scope, co2_factor, ch4_factor, n2o_factor,
   biofuel_co2, ar4_kgco2e, ar5_kgco2e, units, last_updated, source, source_origin";

const EMISSION_COLUMNS: &str = "activity_event_id, asset_id, geo, origin_measurement_timestamp,
   scope, category, activity, source, raw_data, units, co2e_amount, co2e_unit,
   n2o_amount, n2o_unit, ch4_amount, ch4_unit, co2_amount, co2_unit,
   emissions_factor_amount, emissions_factor_unit, extra_json";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Factor lookup and emission output backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn count(&self, table: &'static str) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
      })
      .await?;
    Ok(n as u64)
  }
}

// ─── FactorStore impl ────────────────────────────────────────────────────────

impl FactorStore for SqliteStore {
  type Error = Error;

  async fn get_factor(&self, key: &FactorKey) -> Result<Option<EmissionFactorRecord>> {
    let category = key.category.clone();
    let activity = key.activity.clone();

    let raw: Option<RawFactor> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {FACTOR_COLUMNS} FROM emission_factors
               WHERE category = ?1 AND activity = ?2"
            ),
            rusqlite::params![category, activity],
            RawFactor::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawFactor::into_record).transpose()
  }

  async fn put_factors(&self, batch: &[EmissionFactorRecord]) -> Result<()> {
    if batch.len() > MAX_BATCH_ITEMS {
      return Err(Error::BatchTooLarge(batch.len()));
    }

    let rows: Vec<RawFactor> = batch.iter().map(RawFactor::from_record).collect();
    let written = rows.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT OR REPLACE INTO emission_factors ({FACTOR_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ))?;
          for r in &rows {
            stmt.execute(rusqlite::params![
              r.category,
              r.activity,
              r.scope,
              r.co2_factor,
              r.ch4_factor,
              r.n2o_factor,
              r.biofuel_co2,
              r.ar4_kgco2e,
              r.ar5_kgco2e,
              r.units,
              r.last_updated,
              r.source,
              r.source_origin,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(written, "wrote factor batch");
    Ok(())
  }

  async fn prune_factors(&self, keep: &[FactorKey]) -> Result<u64> {
    let keep: HashSet<(String, String)> = keep
      .iter()
      .map(|k| (k.category.clone(), k.activity.clone()))
      .collect();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let stale: Vec<(String, String)> = {
          let mut stmt = tx.prepare("SELECT category, activity FROM emission_factors")?;
          stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|key| !keep.contains(key))
            .collect()
        };

        let mut removed = 0u64;
        {
          let mut stmt =
            tx.prepare("DELETE FROM emission_factors WHERE category = ?1 AND activity = ?2")?;
          for (category, activity) in &stale {
            removed += stmt.execute(rusqlite::params![category, activity])? as u64;
          }
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    Ok(removed)
  }

  async fn count_factors(&self) -> Result<u64> { self.count("emission_factors").await }

  async fn record_load(&self, manifest: &LoadManifest) -> Result<()> {
    let load_id         = encode_uuid(manifest.load_id);
    let dataset_version = manifest.dataset_version.clone();
    let record_count    = manifest.record_count as i64;
    let batch_count     = manifest.batch_count as i64;
    let mode            = manifest.mode.as_str();
    let loaded_at       = encode_dt(manifest.loaded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO factor_loads (
             load_id, dataset_version, record_count, batch_count, mode, loaded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![load_id, dataset_version, record_count, batch_count, mode, loaded_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn latest_load(&self) -> Result<Option<LoadManifest>> {
    let raw: Option<RawManifest> = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            "SELECT load_id, dataset_version, record_count, batch_count, mode, loaded_at
             FROM factor_loads ORDER BY rowid DESC LIMIT 1",
            [],
            |row| {
              Ok(RawManifest {
                load_id:         row.get(0)?,
                dataset_version: row.get(1)?,
                record_count:    row.get(2)?,
                batch_count:     row.get(3)?,
                mode:            row.get(4)?,
                loaded_at:       row.get(5)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawManifest::into_manifest).transpose()
  }
}

// ─── EmissionStore impl ──────────────────────────────────────────────────────

impl EmissionStore for SqliteStore {
  type Error = Error;

  async fn put_emission(&self, emission: &CalculatedEmission) -> Result<()> {
    let r = RawEmission::from_emission(emission)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT OR REPLACE INTO calculated_emissions ({EMISSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
          ),
          rusqlite::params![
            r.activity_event_id,
            r.asset_id,
            r.geo,
            r.origin_measurement_timestamp,
            r.scope,
            r.category,
            r.activity,
            r.source,
            r.raw_data,
            r.units,
            r.co2e_amount,
            r.co2e_unit,
            r.n2o_amount,
            r.n2o_unit,
            r.ch4_amount,
            r.ch4_unit,
            r.co2_amount,
            r.co2_unit,
            r.emissions_factor_amount,
            r.emissions_factor_unit,
            r.extra_json,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_emission(&self, activity_event_id: &str) -> Result<Option<CalculatedEmission>> {
    let id = activity_event_id.to_owned();

    let raw: Option<RawEmission> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {EMISSION_COLUMNS} FROM calculated_emissions
               WHERE activity_event_id = ?1"
            ),
            rusqlite::params![id],
            RawEmission::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEmission::into_emission).transpose()
  }

  async fn count_emissions(&self) -> Result<u64> { self.count("calculated_emissions").await }

  async fn record_rejection(&self, rejection: &Rejection) -> Result<()> {
    let run_id            = encode_uuid(rejection.run_id);
    let activity_event_id = rejection.activity_event_id.clone();
    let kind              = rejection.kind.clone();
    let message           = rejection.message.clone();
    let recorded_at       = encode_dt(rejection.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rejections (run_id, activity_event_id, kind, message, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![run_id, activity_event_id, kind, message, recorded_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_rejections(&self, run_id: Uuid) -> Result<Vec<Rejection>> {
    let run_id = encode_uuid(run_id);

    let raws: Vec<RawRejection> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, activity_event_id, kind, message, recorded_at
           FROM rejections WHERE run_id = ?1 ORDER BY rejection_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![run_id], |row| {
            Ok(RawRejection {
              run_id:            row.get(0)?,
              activity_event_id: row.get(1)?,
              kind:              row.get(2)?,
              message:           row.get(3)?,
              recorded_at:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRejection::into_rejection).collect()
  }
}
