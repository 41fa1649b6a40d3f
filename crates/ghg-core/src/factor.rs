//! Emission factor records — the reference data the engine resolves against.
//!
//! The reference document arrives with every coefficient as a string because
//! some are left empty. [`RawFactorRecord`] mirrors that document exactly;
//! [`EmissionFactorRecord`] is the typed form, converted once at load time,
//! with unknown coefficients as `None`.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, decimal,
  gwp::{Gas, GwpStandard},
};

// ─── Scope ───────────────────────────────────────────────────────────────────

/// GHG Protocol scope classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScope", into = "u8")]
pub enum Scope {
  /// Direct emissions from owned or controlled sources.
  Direct,
  /// Indirect emissions from purchased energy.
  PurchasedEnergy,
  /// All other indirect emissions in the value chain.
  ValueChain,
}

impl Scope {
  pub fn number(self) -> u8 {
    match self {
      Self::Direct => 1,
      Self::PurchasedEnergy => 2,
      Self::ValueChain => 3,
    }
  }

  pub fn from_number(n: i64) -> Result<Self> {
    match n {
      1 => Ok(Self::Direct),
      2 => Ok(Self::PurchasedEnergy),
      3 => Ok(Self::ValueChain),
      other => Err(Error::InvalidScope(other.to_string())),
    }
  }
}

impl From<Scope> for u8 {
  fn from(scope: Scope) -> Self { scope.number() }
}

/// Scope as it appears in input documents: a number, or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScope {
  Number(i64),
  Text(String),
}

impl TryFrom<RawScope> for Scope {
  type Error = Error;

  fn try_from(raw: RawScope) -> Result<Self> {
    match raw {
      RawScope::Number(n) => Scope::from_number(n),
      RawScope::Text(s) => s
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidScope(s.clone()))
        .and_then(Scope::from_number),
    }
  }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The lookup key of an emission factor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactorKey {
  pub category: String,
  pub activity: String,
}

impl FactorKey {
  pub fn new(category: impl Into<String>, activity: impl Into<String>) -> Self {
    Self { category: category.into(), activity: activity.into() }
  }
}

/// Renders as `category_activity`, the form used to report duplicates.
impl fmt::Display for FactorKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.category, self.activity)
  }
}

// ─── Typed record ────────────────────────────────────────────────────────────

/// Per-unit coefficients of the `ghg` standard block.
///
/// Gas factors and the CO2e totals are kilograms per activity unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coefficients {
  #[serde(with = "decimal::serde_plain_opt")]
  pub co2_factor:  Option<BigDecimal>,
  #[serde(with = "decimal::serde_plain_opt")]
  pub ch4_factor:  Option<BigDecimal>,
  #[serde(with = "decimal::serde_plain_opt")]
  pub n2o_factor:  Option<BigDecimal>,
  #[serde(with = "decimal::serde_plain_opt")]
  pub biofuel_co2: Option<BigDecimal>,
  /// Total kgCO2e per unit under AR4 GWP values.
  #[serde(with = "decimal::serde_plain_opt")]
  pub ar4_kgco2e:  Option<BigDecimal>,
  /// Total kgCO2e per unit under AR5 GWP values.
  #[serde(with = "decimal::serde_plain_opt")]
  pub ar5_kgco2e:  Option<BigDecimal>,
  /// The activity unit the coefficients are expressed against.
  pub units:       String,
}

impl Coefficients {
  pub fn gas(&self, gas: Gas) -> Option<&BigDecimal> {
    match gas {
      Gas::Co2 => self.co2_factor.as_ref(),
      Gas::Ch4 => self.ch4_factor.as_ref(),
      Gas::N2o => self.n2o_factor.as_ref(),
    }
  }

  pub fn kgco2e(&self, standard: GwpStandard) -> Option<&BigDecimal> {
    match standard {
      GwpStandard::Ar4 => self.ar4_kgco2e.as_ref(),
      GwpStandard::Ar5 => self.ar5_kgco2e.as_ref(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhgStandard {
  pub coefficients:  Coefficients,
  pub last_updated:  Option<NaiveDate>,
  pub source:        String,
  pub source_origin: String,
}

/// An immutable emission factor, unique by [`FactorKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionFactorRecord {
  pub key:   FactorKey,
  pub scope: Scope,
  pub ghg:   GhgStandard,
}

// ─── Raw document form ───────────────────────────────────────────────────────

/// One entry of the reference dataset document, as curated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFactorRecord {
  pub category:                   String,
  pub activity:                   String,
  pub scope:                      RawScope,
  pub emissions_factor_standards: RawStandards,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStandards {
  pub ghg: RawGhgStandard,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGhgStandard {
  pub coefficients:  RawCoefficients,
  #[serde(default)]
  pub last_updated:  String,
  #[serde(default)]
  pub source:        String,
  #[serde(default)]
  pub source_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCoefficients {
  #[serde(default)]
  pub co2_factor:  String,
  #[serde(default)]
  pub ch4_factor:  String,
  #[serde(default)]
  pub n2o_factor:  String,
  #[serde(default)]
  pub biofuel_co2: String,
  #[serde(default, rename = "AR4-kgco2e", alias = "AR4_kgco2e")]
  pub ar4_kgco2e:  String,
  #[serde(default, rename = "AR5-kgco2e", alias = "AR5_kgco2e")]
  pub ar5_kgco2e:  String,
  #[serde(default)]
  pub units:       String,
}

impl RawFactorRecord {
  pub fn key(&self) -> FactorKey { FactorKey::new(&self.category, &self.activity) }

  /// Convert into the typed record. Empty coefficients become `None`.
  pub fn into_record(self) -> Result<EmissionFactorRecord> {
    let key = self.key();
    let scope = Scope::try_from(self.scope)?;
    let ghg = self.emissions_factor_standards.ghg;
    let c = ghg.coefficients;

    let coefficients = Coefficients {
      co2_factor:  decimal::parse_optional(&c.co2_factor)?,
      ch4_factor:  decimal::parse_optional(&c.ch4_factor)?,
      n2o_factor:  decimal::parse_optional(&c.n2o_factor)?,
      biofuel_co2: decimal::parse_optional(&c.biofuel_co2)?,
      ar4_kgco2e:  decimal::parse_optional(&c.ar4_kgco2e)?,
      ar5_kgco2e:  decimal::parse_optional(&c.ar5_kgco2e)?,
      units:       c.units.trim().to_owned(),
    };

    Ok(EmissionFactorRecord {
      key,
      scope,
      ghg: GhgStandard {
        coefficients,
        last_updated: parse_date(&ghg.last_updated)?,
        source: ghg.source,
        source_origin: ghg.source_origin,
      },
    })
  }
}

/// Curated dates are ISO (`2022-05-22`) or US style (`05/22/2022`); empty
/// means unknown.
fn parse_date(s: &str) -> Result<Option<NaiveDate>> {
  let s = s.trim();
  if s.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
    .map(Some)
    .map_err(|_| Error::InvalidDate(s.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  const DIESEL: &str = r#"{
    "category": "mobile-combustion",
    "activity": "Diesel Fuel - Diesel Passenger Cars",
    "scope": "1",
    "emissions_factor_standards": {
      "ghg": {
        "coefficients": {
          "co2_factor": "10.21",
          "ch4_factor": "0.00001125",
          "n2o_factor": "",
          "biofuel_co2": "",
          "AR4-kgco2e": "10.21698625",
          "AR5-kgco2e": "10.2162775",
          "units": "gallon"
        },
        "last_updated": "2022-05-22",
        "source": "EPA",
        "source_origin": "GHG Emission Factors Hub"
      }
    }
  }"#;

  #[test]
  fn raw_record_converts_to_typed() {
    let raw: RawFactorRecord = serde_json::from_str(DIESEL).unwrap();
    let record = raw.into_record().unwrap();

    assert_eq!(record.scope, Scope::Direct);
    assert_eq!(record.key.to_string(), "mobile-combustion_Diesel Fuel - Diesel Passenger Cars");
    let c = &record.ghg.coefficients;
    assert_eq!(c.co2_factor, Some(decimal::parse("10.21").unwrap()));
    assert_eq!(c.n2o_factor, None);
    assert_eq!(c.units, "gallon");
    assert_eq!(record.ghg.last_updated, NaiveDate::from_ymd_opt(2022, 5, 22));
  }

  #[test]
  fn underscore_coefficient_names_are_accepted() {
    let doc = DIESEL
      .replace("AR4-kgco2e", "AR4_kgco2e")
      .replace("AR5-kgco2e", "AR5_kgco2e");
    let raw: RawFactorRecord = serde_json::from_str(&doc).unwrap();
    let record = raw.into_record().unwrap();
    assert!(record.ghg.coefficients.ar4_kgco2e.is_some());
  }

  #[test]
  fn scope_out_of_range_is_rejected() {
    let raw: RawFactorRecord =
      serde_json::from_str(&DIESEL.replace("\"scope\": \"1\"", "\"scope\": 7")).unwrap();
    assert!(matches!(raw.into_record(), Err(Error::InvalidScope(_))));
  }

  #[test]
  fn malformed_coefficient_is_rejected() {
    let raw: RawFactorRecord =
      serde_json::from_str(&DIESEL.replace("\"10.21\"", "\"ten\"")).unwrap();
    assert!(matches!(raw.into_record(), Err(Error::InvalidDecimal(_))));
  }

  #[test]
  fn scope_serialises_as_number() {
    assert_eq!(serde_json::to_string(&Scope::PurchasedEnergy).unwrap(), "2");
    let s: Scope = serde_json::from_str("\"3\"").unwrap();
    assert_eq!(s, Scope::ValueChain);
  }
}
