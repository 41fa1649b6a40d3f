//! Activity-unit normalisation and declared conversions.
//!
//! Units are compared by canonical name: trimmed, lowercased, inner
//! whitespace collapsed, then mapped through the alias table. No conversion
//! happens implicitly; a conversion is applied only when it has been declared
//! for the exact (event unit, factor unit) pair.

use std::collections::HashMap;

use bigdecimal::BigDecimal;

const BUILTIN_ALIASES: &[(&str, &str)] = &[
  ("gal", "gallon"),
  ("gals", "gallon"),
  ("gallons", "gallon"),
  ("us gallon", "gallon"),
  ("us gallons", "gallon"),
  ("l", "liter"),
  ("litre", "liter"),
  ("litres", "liter"),
  ("liters", "liter"),
  ("kilowatt hour", "kwh"),
  ("kilowatt hours", "kwh"),
  ("kilowatt-hour", "kwh"),
  ("megawatt hour", "mwh"),
  ("megawatt hours", "mwh"),
  ("therms", "therm"),
  ("mmbtus", "mmbtu"),
  ("short tons", "short ton"),
  ("tons", "short ton"),
  ("ton", "short ton"),
  ("tonnes", "tonne"),
  ("metric ton", "tonne"),
  ("metric tons", "tonne"),
  ("kilogram", "kg"),
  ("kilograms", "kg"),
  ("miles", "mile"),
  ("vehicle-miles", "vehicle-mile"),
  ("passenger-miles", "passenger-mile"),
  ("ton-miles", "ton-mile"),
];

/// How an event's quantity relates to a factor's unit basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitResolution {
  /// Same canonical unit; use the quantity as-is.
  Same,
  /// A declared conversion applies; multiply the quantity by this.
  Converted(BigDecimal),
}

#[derive(Debug, Clone)]
pub struct UnitRegistry {
  aliases:     HashMap<String, String>,
  conversions: HashMap<(String, String), BigDecimal>,
}

impl Default for UnitRegistry {
  fn default() -> Self { Self::builtin() }
}

fn normalise(unit: &str) -> String {
  unit.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl UnitRegistry {
  /// A registry with only the built-in spelling aliases and no conversions.
  pub fn builtin() -> Self {
    let aliases = BUILTIN_ALIASES
      .iter()
      .map(|(from, to)| ((*from).to_owned(), (*to).to_owned()))
      .collect();
    Self { aliases, conversions: HashMap::new() }
  }

  /// Treat `alias` as another spelling of `canonical`.
  pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
    let canonical = self.canonical(canonical);
    self.aliases.insert(normalise(alias), canonical);
    self
  }

  /// Declare that one `from` equals `multiplier` of `to`.
  pub fn with_conversion(mut self, from: &str, to: &str, multiplier: BigDecimal) -> Self {
    let key = (self.canonical(from), self.canonical(to));
    self.conversions.insert(key, multiplier);
    self
  }

  pub fn canonical(&self, unit: &str) -> String {
    let n = normalise(unit);
    self.aliases.get(&n).cloned().unwrap_or(n)
  }

  /// Relate `event_unit` to `factor_unit`, or `None` if they are
  /// incompatible.
  pub fn resolve(&self, event_unit: &str, factor_unit: &str) -> Option<UnitResolution> {
    let from = self.canonical(event_unit);
    let to = self.canonical(factor_unit);
    if from == to {
      return Some(UnitResolution::Same);
    }
    self
      .conversions
      .get(&(from, to))
      .cloned()
      .map(UnitResolution::Converted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn spelling_variants_resolve_to_same_unit() {
    let units = UnitRegistry::builtin();
    assert_eq!(units.resolve("gal", "gallon"), Some(UnitResolution::Same));
    assert_eq!(units.resolve("kwH", "kWh"), Some(UnitResolution::Same));
    assert_eq!(units.resolve("  Short   Tons ", "short ton"), Some(UnitResolution::Same));
  }

  #[test]
  fn different_units_do_not_convert_implicitly() {
    let units = UnitRegistry::builtin();
    assert_eq!(units.resolve("mwh", "kwh"), None);
    assert_eq!(units.resolve("liter", "gallon"), None);
  }

  #[test]
  fn declared_conversion_applies_in_one_direction() {
    let units =
      UnitRegistry::builtin().with_conversion("MWh", "kWh", BigDecimal::from(1000));
    assert_eq!(
      units.resolve("megawatt hours", "kwh"),
      Some(UnitResolution::Converted(BigDecimal::from(1000)))
    );
    assert_eq!(units.resolve("kwh", "mwh"), None);
  }

  #[test]
  fn custom_alias_chains_to_canonical() {
    let units = UnitRegistry::builtin().with_alias("gallons (us)", "gals");
    assert_eq!(units.resolve("Gallons (US)", "gallon"), Some(UnitResolution::Same));
  }
}
