//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, dates as ISO 8601, decimals as
//! plain decimal strings, UUIDs as hyphenated lowercase strings, and the
//! event's unmodelled fields as compact JSON.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use ghg_core::{
  decimal,
  emission::{CalculatedEmission, Quantity, Rejection},
  event::{ActivityEvent, Geo},
  factor::{Coefficients, EmissionFactorRecord, FactorKey, GhgStandard, Scope},
  loader::{LoadManifest, LoadMode},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_decimal(d: &BigDecimal) -> String { decimal::to_plain(d) }

fn encode_opt_decimal(d: &Option<BigDecimal>) -> Option<String> { d.as_ref().map(encode_decimal) }

fn decode_decimal(s: &str) -> Result<BigDecimal> { Ok(decimal::parse(s)?) }

fn decode_opt_decimal(s: Option<String>) -> Result<Option<BigDecimal>> {
  s.as_deref().map(decode_decimal).transpose()
}

fn decode_scope(n: i64) -> Result<Scope> {
  Scope::from_number(n).map_err(|_| Error::Corrupt { column: "scope", value: n.to_string() })
}

fn decode_mode(s: &str) -> Result<LoadMode> {
  match s {
    "upsert" => Ok(LoadMode::Upsert),
    "replace" => Ok(LoadMode::Replace),
    other => Err(Error::Corrupt { column: "mode", value: other.to_owned() }),
  }
}

fn encode_quantity(q: &Option<Quantity>) -> (Option<String>, Option<String>) {
  match q {
    Some(q) => (Some(encode_decimal(&q.amount)), Some(q.unit.clone())),
    None => (None, None),
  }
}

fn decode_quantity(amount: Option<String>, unit: Option<String>) -> Result<Option<Quantity>> {
  match (amount, unit) {
    (Some(amount), Some(unit)) => Ok(Some(Quantity { amount: decode_decimal(&amount)?, unit })),
    _ => Ok(None),
  }
}

// ─── Emission factors ────────────────────────────────────────────────────────

/// Column values of one `emission_factors` row.
pub struct RawFactor {
  pub category:      String,
  pub activity:      String,
  pub scope:         i64,
  pub co2_factor:    Option<String>,
  pub ch4_factor:    Option<String>,
  pub n2o_factor:    Option<String>,
  pub biofuel_co2:   Option<String>,
  pub ar4_kgco2e:    Option<String>,
  pub ar5_kgco2e:    Option<String>,
  pub units:         String,
  pub last_updated:  Option<String>,
  pub source:        String,
  pub source_origin: String,
}

impl RawFactor {
  pub fn from_record(record: &EmissionFactorRecord) -> Self {
    let c = &record.ghg.coefficients;
    Self {
      category:      record.key.category.clone(),
      activity:      record.key.activity.clone(),
      scope:         i64::from(record.scope.number()),
      co2_factor:    encode_opt_decimal(&c.co2_factor),
      ch4_factor:    encode_opt_decimal(&c.ch4_factor),
      n2o_factor:    encode_opt_decimal(&c.n2o_factor),
      biofuel_co2:   encode_opt_decimal(&c.biofuel_co2),
      ar4_kgco2e:    encode_opt_decimal(&c.ar4_kgco2e),
      ar5_kgco2e:    encode_opt_decimal(&c.ar5_kgco2e),
      units:         c.units.clone(),
      last_updated:  record.ghg.last_updated.map(|d| d.format("%Y-%m-%d").to_string()),
      source:        record.ghg.source.clone(),
      source_origin: record.ghg.source_origin.clone(),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      category:      row.get(0)?,
      activity:      row.get(1)?,
      scope:         row.get(2)?,
      co2_factor:    row.get(3)?,
      ch4_factor:    row.get(4)?,
      n2o_factor:    row.get(5)?,
      biofuel_co2:   row.get(6)?,
      ar4_kgco2e:    row.get(7)?,
      ar5_kgco2e:    row.get(8)?,
      units:         row.get(9)?,
      last_updated:  row.get(10)?,
      source:        row.get(11)?,
      source_origin: row.get(12)?,
    })
  }

  pub fn into_record(self) -> Result<EmissionFactorRecord> {
    Ok(EmissionFactorRecord {
      key:   FactorKey { category: self.category, activity: self.activity },
      scope: decode_scope(self.scope)?,
      ghg:   GhgStandard {
        coefficients:  Coefficients {
          co2_factor:  decode_opt_decimal(self.co2_factor)?,
          ch4_factor:  decode_opt_decimal(self.ch4_factor)?,
          n2o_factor:  decode_opt_decimal(self.n2o_factor)?,
          biofuel_co2: decode_opt_decimal(self.biofuel_co2)?,
          ar4_kgco2e:  decode_opt_decimal(self.ar4_kgco2e)?,
          ar5_kgco2e:  decode_opt_decimal(self.ar5_kgco2e)?,
          units:       self.units,
        },
        last_updated:  self.last_updated.as_deref().map(decode_date).transpose()?,
        source:        self.source,
        source_origin: self.source_origin,
      },
    })
  }
}

// ─── Load manifests ──────────────────────────────────────────────────────────

pub struct RawManifest {
  pub load_id:         String,
  pub dataset_version: String,
  pub record_count:    i64,
  pub batch_count:     i64,
  pub mode:            String,
  pub loaded_at:       String,
}

impl RawManifest {
  pub fn into_manifest(self) -> Result<LoadManifest> {
    Ok(LoadManifest {
      load_id:         decode_uuid(&self.load_id)?,
      dataset_version: self.dataset_version,
      record_count:    self.record_count as u64,
      batch_count:     self.batch_count as u64,
      mode:            decode_mode(&self.mode)?,
      loaded_at:       decode_dt(&self.loaded_at)?,
    })
  }
}

// ─── Calculated emissions ────────────────────────────────────────────────────

/// Column values of one `calculated_emissions` row, in table order.
pub struct RawEmission {
  pub activity_event_id:            String,
  pub asset_id:                     Option<String>,
  pub geo:                          Option<String>,
  pub origin_measurement_timestamp: Option<String>,
  pub scope:                        i64,
  pub category:                     String,
  pub activity:                     String,
  pub source:                       Option<String>,
  pub raw_data:                     String,
  pub units:                        String,
  pub co2e_amount:                  String,
  pub co2e_unit:                    String,
  pub n2o_amount:                   Option<String>,
  pub n2o_unit:                     Option<String>,
  pub ch4_amount:                   Option<String>,
  pub ch4_unit:                     Option<String>,
  pub co2_amount:                   Option<String>,
  pub co2_unit:                     Option<String>,
  pub emissions_factor_amount:      String,
  pub emissions_factor_unit:        String,
  pub extra_json:                   String,
}

impl RawEmission {
  pub fn from_emission(emission: &CalculatedEmission) -> Result<Self> {
    let event = &emission.event;
    let (n2o_amount, n2o_unit) = encode_quantity(&emission.n2o);
    let (ch4_amount, ch4_unit) = encode_quantity(&emission.ch4);
    let (co2_amount, co2_unit) = encode_quantity(&emission.co2);

    Ok(Self {
      activity_event_id: event.activity_event_id.clone(),
      asset_id: event.asset_id.clone(),
      geo: event.geo.as_ref().map(serde_json::to_string).transpose()?,
      origin_measurement_timestamp: event.origin_measurement_timestamp.map(encode_dt),
      scope: i64::from(event.scope.number()),
      category: event.category.clone(),
      activity: event.activity.clone(),
      source: event.source.clone(),
      raw_data: encode_decimal(&event.raw_data),
      units: event.units.clone(),
      co2e_amount: encode_decimal(&emission.co2e.amount),
      co2e_unit: emission.co2e.unit.clone(),
      n2o_amount,
      n2o_unit,
      ch4_amount,
      ch4_unit,
      co2_amount,
      co2_unit,
      emissions_factor_amount: encode_decimal(&emission.emissions_factor.amount),
      emissions_factor_unit: emission.emissions_factor.unit.clone(),
      extra_json: serde_json::to_string(&event.extra)?,
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_event_id:            row.get(0)?,
      asset_id:                     row.get(1)?,
      geo:                          row.get(2)?,
      origin_measurement_timestamp: row.get(3)?,
      scope:                        row.get(4)?,
      category:                     row.get(5)?,
      activity:                     row.get(6)?,
      source:                       row.get(7)?,
      raw_data:                     row.get(8)?,
      units:                        row.get(9)?,
      co2e_amount:                  row.get(10)?,
      co2e_unit:                    row.get(11)?,
      n2o_amount:                   row.get(12)?,
      n2o_unit:                     row.get(13)?,
      ch4_amount:                   row.get(14)?,
      ch4_unit:                     row.get(15)?,
      co2_amount:                   row.get(16)?,
      co2_unit:                     row.get(17)?,
      emissions_factor_amount:      row.get(18)?,
      emissions_factor_unit:        row.get(19)?,
      extra_json:                   row.get(20)?,
    })
  }

  pub fn into_emission(self) -> Result<CalculatedEmission> {
    let geo: Option<Geo> = self.geo.as_deref().map(serde_json::from_str).transpose()?;

    let event = ActivityEvent {
      activity_event_id: self.activity_event_id,
      asset_id: self.asset_id,
      geo,
      origin_measurement_timestamp: self
        .origin_measurement_timestamp
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      scope: decode_scope(self.scope)?,
      category: self.category,
      activity: self.activity,
      source: self.source,
      raw_data: decode_decimal(&self.raw_data)?,
      units: self.units,
      extra: serde_json::from_str(&self.extra_json)?,
    };

    Ok(CalculatedEmission {
      event,
      co2e: Quantity {
        amount: decode_decimal(&self.co2e_amount)?,
        unit:   self.co2e_unit,
      },
      co2: decode_quantity(self.co2_amount, self.co2_unit)?,
      ch4: decode_quantity(self.ch4_amount, self.ch4_unit)?,
      n2o: decode_quantity(self.n2o_amount, self.n2o_unit)?,
      emissions_factor: Quantity {
        amount: decode_decimal(&self.emissions_factor_amount)?,
        unit:   self.emissions_factor_unit,
      },
    })
  }
}

// ─── Rejections ──────────────────────────────────────────────────────────────

pub struct RawRejection {
  pub run_id:            String,
  pub activity_event_id: String,
  pub kind:              String,
  pub message:           String,
  pub recorded_at:       String,
}

impl RawRejection {
  pub fn into_rejection(self) -> Result<Rejection> {
    Ok(Rejection {
      run_id:            decode_uuid(&self.run_id)?,
      activity_event_id: self.activity_event_id,
      kind:              self.kind,
      message:           self.message,
      recorded_at:       decode_dt(&self.recorded_at)?,
    })
  }
}
