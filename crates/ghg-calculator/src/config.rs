//! Runtime configuration, deserialised from `ghg.toml` layered with `GHG_*`
//! environment variables.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use bigdecimal::BigDecimal;
use ghg_core::{
  calculate::Calculator,
  decimal,
  gwp::{GwpStandard, GwpTable, MassUnit},
  units::UnitRegistry,
};
use serde::Deserialize;

use crate::{Error, Result, pipeline::RetryPolicy};

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
  pub store_path:    PathBuf,
  pub gwp_standard:  GwpStandard,
  pub mass_unit:     MassUnit,
  /// Maximum number of events in flight at once.
  pub concurrency:   usize,
  /// Upper bound on each factor lookup and each emission write.
  pub io_timeout_ms: u64,
  pub retry:         RetryConfig,
  pub gwp:           GwpOverrides,
  pub units:         UnitsConfig,
}

impl Default for CalculatorConfig {
  fn default() -> Self {
    Self {
      store_path:    PathBuf::from("ghg.sqlite3"),
      gwp_standard:  GwpStandard::default(),
      mass_unit:     MassUnit::default(),
      concurrency:   8,
      io_timeout_ms: 5_000,
      retry:         RetryConfig::default(),
      gwp:           GwpOverrides::default(),
      units:         UnitsConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Total attempts per event, including the first.
  pub max_attempts:       u32,
  pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self { Self { max_attempts: 3, initial_backoff_ms: 100 } }
}

/// Replacements for the IPCC GWP values of each assessment report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GwpOverrides {
  pub ar4: GwpOverride,
  pub ar5: GwpOverride,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GwpOverride {
  #[serde(with = "decimal::serde_plain_opt")]
  pub ch4: Option<BigDecimal>,
  #[serde(with = "decimal::serde_plain_opt")]
  pub n2o: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
  /// Extra spellings, `alias = "canonical"`.
  pub aliases:     BTreeMap<String, String>,
  pub conversions: Vec<ConversionConfig>,
}

/// One `from` unit equals `multiplier` of the `to` unit.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
  pub from:       String,
  pub to:         String,
  #[serde(with = "decimal::serde_plain")]
  pub multiplier: BigDecimal,
}

// ─── Loading ──────────────────────────────────────────────────────────────────

impl CalculatorConfig {
  /// Layer the optional TOML file at `path` under `GHG_*` environment
  /// variables (`__` separates nested keys, e.g. `GHG_RETRY__MAX_ATTEMPTS`).
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix("GHG")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .map_err(|e| Error::Config(e.to_string()))?;

    let cfg: Self = settings
      .try_deserialize()
      .map_err(|e| Error::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Parse a TOML document, without environment overrides.
  pub fn from_toml(toml: &str) -> Result<Self> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .and_then(|c| c.try_deserialize())
      .map_err(|e| Error::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<()> {
    if self.concurrency == 0 {
      return Err(Error::Config("concurrency must be at least 1".into()));
    }
    if self.retry.max_attempts == 0 {
      return Err(Error::Config("retry.max_attempts must be at least 1".into()));
    }
    if let Some(c) = self.units.conversions.iter().find(|c| c.multiplier <= BigDecimal::from(0)) {
      return Err(Error::Config(format!(
        "conversion {} -> {} must have a positive multiplier",
        c.from, c.to
      )));
    }
    Ok(())
  }

  // ── Derived components ────────────────────────────────────────────────────

  /// IPCC values for the selected standard with any configured overrides.
  pub fn gwp_table(&self) -> GwpTable {
    let overrides = match self.gwp_standard {
      GwpStandard::Ar4 => &self.gwp.ar4,
      GwpStandard::Ar5 => &self.gwp.ar5,
    };
    let mut table = GwpTable::ipcc(self.gwp_standard);
    if let Some(ch4) = &overrides.ch4 {
      table.ch4 = Some(ch4.clone());
    }
    if let Some(n2o) = &overrides.n2o {
      table.n2o = Some(n2o.clone());
    }
    table
  }

  pub fn unit_registry(&self) -> UnitRegistry {
    let registry = self
      .units
      .aliases
      .iter()
      .fold(UnitRegistry::builtin(), |r, (alias, canonical)| r.with_alias(alias, canonical));
    self.units.conversions.iter().fold(registry, |r, c| {
      r.with_conversion(&c.from, &c.to, c.multiplier.clone())
    })
  }

  pub fn calculator(&self) -> Calculator {
    Calculator::new(self.gwp_standard)
      .with_gwp_table(self.gwp_table())
      .with_mass_unit(self.mass_unit)
      .with_units(self.unit_registry())
  }

  pub fn io_timeout(&self) -> Duration { Duration::from_millis(self.io_timeout_ms) }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts:    self.retry.max_attempts,
      initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
    }
  }
}

#[cfg(test)]
mod tests {
  use ghg_core::{gwp::Gas, units::UnitResolution};

  use super::*;

  #[test]
  fn empty_document_gives_defaults() {
    let cfg = CalculatorConfig::from_toml("").unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("ghg.sqlite3"));
    assert_eq!(cfg.gwp_standard, GwpStandard::Ar5);
    assert_eq!(cfg.mass_unit, MassUnit::Kg);
    assert_eq!(cfg.concurrency, 8);
    assert_eq!(cfg.io_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.retry_policy().max_attempts, 3);
    assert_eq!(cfg.gwp_table(), GwpTable::ipcc(GwpStandard::Ar5));
  }

  #[test]
  fn overrides_apply_to_the_selected_standard_only() {
    let cfg = CalculatorConfig::from_toml(
      r#"
        gwp_standard = "ar4"
        mass_unit = "tonnes"

        [gwp.ar4]
        ch4 = "30"

        [gwp.ar5]
        n2o = "1"
      "#,
    )
    .unwrap();

    let table = cfg.gwp_table();
    assert_eq!(table.multiplier(Gas::Ch4), Some(BigDecimal::from(30)));
    assert_eq!(table.multiplier(Gas::N2o), Some(BigDecimal::from(298)));
    assert_eq!(cfg.calculator().mass_unit(), MassUnit::Tonnes);
  }

  #[test]
  fn unit_aliases_and_conversions_reach_the_registry() {
    let cfg = CalculatorConfig::from_toml(
      r#"
        [units.aliases]
        "imp gal" = "imperial gallon"

        [[units.conversions]]
        from = "imperial gallon"
        to = "gallon"
        multiplier = "1.20095"
      "#,
    )
    .unwrap();

    let registry = cfg.unit_registry();
    assert_eq!(
      registry.resolve("imp gal", "gallons"),
      Some(UnitResolution::Converted("1.20095".parse().unwrap()))
    );
  }

  #[test]
  fn zero_concurrency_is_rejected() {
    let err = CalculatorConfig::from_toml("concurrency = 0").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn non_positive_multiplier_is_rejected() {
    let err = CalculatorConfig::from_toml(
      r#"
        [[units.conversions]]
        from = "liter"
        to = "gallon"
        multiplier = "0"
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }
}
