//! Activity events — one reported measurement to be converted to emissions.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, value::RawValue};

use crate::{
  Error, Result, decimal,
  factor::{FactorKey, Scope},
};

/// A point location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geo {
  pub lat:  f64,
  pub long: f64,
}

/// A single reported activity.
///
/// Scope-1 events from fleet or facility systems carry asset, location and
/// measurement time; scope-2 events extracted from utility bills usually
/// carry none of these, so they are optional. Fields not modelled here (e.g.
/// `supplier`) are kept in `extra` and written back out untouched.
///
/// Parse input lines with [`ActivityEvent::from_json`]; the derived
/// `Deserialize` sees numbers only after serde_json has narrowed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
  pub activity_event_id:            String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub asset_id:                     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geo:                          Option<Geo>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "timestamp_opt"
  )]
  pub origin_measurement_timestamp: Option<DateTime<Utc>>,
  pub scope:                        Scope,
  pub category:                     String,
  pub activity:                     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source:                       Option<String>,
  #[serde(with = "decimal::serde_plain")]
  pub raw_data:                     BigDecimal,
  pub units:                        String,
  #[serde(flatten)]
  pub extra:                        serde_json::Map<String, serde_json::Value>,
}

impl ActivityEvent {
  /// The factor this event resolves against.
  pub fn factor_key(&self) -> FactorKey { FactorKey::new(&self.category, &self.activity) }

  /// Parse one JSON document into an event.
  ///
  /// A numeric `raw_data` is taken from its literal digits; every other
  /// field goes through the derived deserializer.
  pub fn from_json(s: &str) -> Result<Self> {
    let fields: BTreeMap<String, Box<RawValue>> = serde_json::from_str(s)?;
    let mut doc = serde_json::Map::new();
    for (key, raw) in fields {
      let value = if key == "raw_data" {
        decimal::from_json_literal(raw.get())?
          .map_or(Value::Null, |d| Value::String(decimal::to_plain(&d)))
      } else {
        serde_json::from_str(raw.get())?
      };
      doc.insert(key, value);
    }
    Ok(serde_json::from_value(Value::Object(doc))?)
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Parse a measurement timestamp. RFC 3339 is preferred; the naive
/// `YYYY-MM-DD HH:MM:SS` form emitted by upstream transforms is read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
    .map(|naive| naive.and_utc())
    .map_err(|_| Error::InvalidTimestamp(s.to_owned()))
}

mod timestamp_opt {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match value {
      Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw
      .filter(|s| !s.trim().is_empty())
      .map(|s| super::parse_timestamp(&s))
      .transpose()
      .map_err(D::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  const SCOPE1: &str = r#"{"activity_event_id": "customer-carbonlake-12345", "asset_id": "vehicle-1234", "geo": { "lat": 45.5152, "long": 122.6784}, "origin_measurement_timestamp":"2022-06-26 02:31:29", "scope": 1, "category": "mobile-combustion", "activity": "Diesel Fuel - Diesel Passenger Cars", "source": "company_fleet_management_database", "raw_data": 103.45, "units": "gal"}"#;

  const SCOPE2: &str = r#"{ "activity_event_id": "customer-carbonlake-12345", "supplier": "eversource", "scope": 2, "category": "grid-region-location-based", "activity": "Quebec", "raw_data": 453, "units": "kwH"}"#;

  #[test]
  fn parses_scope1_fleet_event() {
    let event = ActivityEvent::from_json(SCOPE1).unwrap();
    assert_eq!(event.scope, Scope::Direct);
    assert_eq!(event.asset_id.as_deref(), Some("vehicle-1234"));
    assert_eq!(event.raw_data, decimal::parse("103.45").unwrap());
    assert_eq!(
      event.origin_measurement_timestamp,
      Some(Utc.with_ymd_and_hms(2022, 6, 26, 2, 31, 29).unwrap())
    );
    assert!(event.extra.is_empty());
  }

  #[test]
  fn parses_scope2_bill_event_and_keeps_extra_fields() {
    let event = ActivityEvent::from_json(SCOPE2).unwrap();
    assert_eq!(event.scope, Scope::PurchasedEnergy);
    assert!(event.asset_id.is_none());
    assert!(event.origin_measurement_timestamp.is_none());
    assert_eq!(event.extra.get("supplier"), Some(&serde_json::json!("eversource")));

    let out = serde_json::to_value(&event).unwrap();
    assert_eq!(out["supplier"], "eversource");
    assert_eq!(out["raw_data"], "453");
  }

  #[test]
  fn rfc3339_timestamps_are_accepted() {
    let ts = parse_timestamp("2022-06-26T02:31:29+02:00").unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2022, 6, 26, 0, 31, 29).unwrap());
    assert!(parse_timestamp("yesterday").is_err());
  }

  #[test]
  fn numeric_raw_data_keeps_every_digit() {
    let doc = SCOPE2.replace("453", "1234567890.1234567890123456");
    let event = ActivityEvent::from_json(&doc).unwrap();
    assert_eq!(event.raw_data, decimal::parse("1234567890.1234567890123456").unwrap());
    assert!(decimal::fits_column(&event.raw_data));
    assert_eq!(event.extra.get("supplier"), Some(&serde_json::json!("eversource")));
  }

  #[test]
  fn string_raw_data_is_accepted() {
    let doc = SCOPE2.replace("453", r#""0.000000000000000125""#);
    let event = ActivityEvent::from_json(&doc).unwrap();
    assert_eq!(decimal::to_plain(&event.raw_data), "0.000000000000000125");
  }

  #[test]
  fn non_numeric_raw_data_is_an_error() {
    assert!(ActivityEvent::from_json(&SCOPE2.replace("453", "true")).is_err());
    assert!(ActivityEvent::from_json(&SCOPE2.replace("453", "null")).is_err());
    assert!(ActivityEvent::from_json("[1, 2]").is_err());
  }

  #[test]
  fn missing_raw_data_is_an_error() {
    let doc = SCOPE2.replace("\"raw_data\": 453,", "");
    assert!(ActivityEvent::from_json(&doc).is_err());
  }
}
