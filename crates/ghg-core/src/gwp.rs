//! Gases, global-warming-potential standards and reporting mass units.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// The gases an emission factor decomposes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gas {
  Co2,
  Ch4,
  N2o,
}

impl Gas {
  pub const ALL: [Gas; 3] = [Gas::Co2, Gas::Ch4, Gas::N2o];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Co2 => "co2",
      Self::Ch4 => "ch4",
      Self::N2o => "n2o",
    }
  }
}

/// IPCC assessment report whose GWP values convert gas mass to CO2e.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GwpStandard {
  Ar4,
  #[default]
  Ar5,
}

impl GwpStandard {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ar4 => "ar4",
      Self::Ar5 => "ar5",
    }
  }
}

/// GWP multipliers for one standard. CO2 is 1 by definition; a `None` entry
/// means the standard publishes no value for that gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GwpTable {
  #[serde(default, with = "crate::decimal::serde_plain_opt")]
  pub ch4: Option<BigDecimal>,
  #[serde(default, with = "crate::decimal::serde_plain_opt")]
  pub n2o: Option<BigDecimal>,
}

impl GwpTable {
  /// The 100-year values published by the IPCC for `standard`.
  pub fn ipcc(standard: GwpStandard) -> Self {
    let (ch4, n2o) = match standard {
      GwpStandard::Ar4 => (25, 298),
      GwpStandard::Ar5 => (28, 265),
    };
    Self {
      ch4: Some(BigDecimal::from(ch4)),
      n2o: Some(BigDecimal::from(n2o)),
    }
  }

  pub fn multiplier(&self, gas: Gas) -> Option<BigDecimal> {
    match gas {
      Gas::Co2 => Some(BigDecimal::from(1)),
      Gas::Ch4 => self.ch4.clone(),
      Gas::N2o => self.n2o.clone(),
    }
  }
}

/// Mass unit in which calculated amounts are reported.
///
/// Coefficients are expressed in kilograms per activity unit, so `Kg` reports
/// them unscaled and `Tonnes` divides by 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
  #[default]
  Kg,
  Tonnes,
}

impl MassUnit {
  pub fn label(self) -> &'static str {
    match self {
      Self::Kg => "kg",
      Self::Tonnes => "tonnes",
    }
  }

  /// Exact multiplier from kilograms to this unit.
  pub fn scale(self) -> BigDecimal {
    match self {
      Self::Kg => BigDecimal::from(1),
      Self::Tonnes => BigDecimal::new(1.into(), 3),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ipcc_tables_differ_by_standard() {
    let ar4 = GwpTable::ipcc(GwpStandard::Ar4);
    let ar5 = GwpTable::ipcc(GwpStandard::Ar5);
    assert_eq!(ar4.multiplier(Gas::Ch4), Some(BigDecimal::from(25)));
    assert_eq!(ar5.multiplier(Gas::Ch4), Some(BigDecimal::from(28)));
    assert_eq!(ar4.multiplier(Gas::N2o), Some(BigDecimal::from(298)));
    assert_eq!(ar5.multiplier(Gas::N2o), Some(BigDecimal::from(265)));
    assert_eq!(ar5.multiplier(Gas::Co2), Some(BigDecimal::from(1)));
  }

  #[test]
  fn tonnes_scale_is_exact() {
    let kg = BigDecimal::from(1234);
    assert_eq!(kg * MassUnit::Tonnes.scale(), "1.234".parse::<BigDecimal>().unwrap());
  }

  #[test]
  fn standard_names_round_trip_through_serde() {
    let s: GwpStandard = serde_json::from_str("\"ar4\"").unwrap();
    assert_eq!(s, GwpStandard::Ar4);
    assert_eq!(serde_json::to_string(&MassUnit::Tonnes).unwrap(), "\"tonnes\"");
  }
}
