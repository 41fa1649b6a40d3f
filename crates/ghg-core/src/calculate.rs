//! The multi-gas calculation engine.
//!
//! For an event and its factor the engine validates units, multiplies the
//! activity quantity by each available gas coefficient, and folds the gas
//! amounts into CO2e with the GWP values of the configured standard. All
//! arithmetic is exact decimal; results are rounded half-even to the output
//! column scale once per amount.

use bigdecimal::BigDecimal;
use tracing::debug;

use crate::{
  CalculationError, decimal,
  emission::{CalculatedEmission, Quantity},
  event::ActivityEvent,
  factor::EmissionFactorRecord,
  gwp::{Gas, GwpStandard, GwpTable, MassUnit},
  store::FactorStore,
  units::{UnitRegistry, UnitResolution},
};

/// Stateless calculator; cheap to share between tasks.
#[derive(Debug, Clone)]
pub struct Calculator {
  standard:  GwpStandard,
  gwp:       GwpTable,
  mass_unit: MassUnit,
  units:     UnitRegistry,
}

impl Calculator {
  /// A calculator using the IPCC table for `standard`, reporting in
  /// kilograms, with the built-in unit aliases.
  pub fn new(standard: GwpStandard) -> Self {
    Self {
      standard,
      gwp: GwpTable::ipcc(standard),
      mass_unit: MassUnit::default(),
      units: UnitRegistry::builtin(),
    }
  }

  pub fn with_gwp_table(mut self, gwp: GwpTable) -> Self {
    self.gwp = gwp;
    self
  }

  pub fn with_mass_unit(mut self, mass_unit: MassUnit) -> Self {
    self.mass_unit = mass_unit;
    self
  }

  pub fn with_units(mut self, units: UnitRegistry) -> Self {
    self.units = units;
    self
  }

  pub fn standard(&self) -> GwpStandard { self.standard }

  pub fn mass_unit(&self) -> MassUnit { self.mass_unit }

  /// Look up the factor for `event` in `store`.
  pub async fn resolve<S: FactorStore>(
    &self,
    store: &S,
    event: &ActivityEvent,
  ) -> Result<EmissionFactorRecord, CalculationError> {
    let key = event.factor_key();
    store
      .get_factor(&key)
      .await
      .map_err(|e| CalculationError::Lookup(Box::new(e)))?
      .ok_or(CalculationError::UnresolvedFactor {
        category: key.category,
        activity: key.activity,
      })
  }

  /// Resolve the factor for `event`, then [`compute`](Self::compute).
  pub async fn calculate<S: FactorStore>(
    &self,
    store: &S,
    event: &ActivityEvent,
  ) -> Result<CalculatedEmission, CalculationError> {
    let factor = self.resolve(store, event).await?;
    self.compute(event, &factor)
  }

  /// Compute the emissions of `event` under `factor`. Pure and
  /// deterministic.
  pub fn compute(
    &self,
    event: &ActivityEvent,
    factor: &EmissionFactorRecord,
  ) -> Result<CalculatedEmission, CalculationError> {
    if factor.key != event.factor_key() {
      return Err(CalculationError::UnresolvedFactor {
        category: event.category.clone(),
        activity: event.activity.clone(),
      });
    }
    if !decimal::fits_column(&event.raw_data) {
      return Err(CalculationError::PrecisionOverflow {
        field: "raw_data",
        value: decimal::to_plain(&event.raw_data),
      });
    }

    let key = factor.key.to_string();
    let coefficients = &factor.ghg.coefficients;
    let incomplete = |missing: String| CalculationError::IncompleteFactor {
      key: key.clone(),
      missing,
    };

    if coefficients.units.is_empty() {
      return Err(incomplete("unit basis".into()));
    }
    let quantity = match self.units.resolve(&event.units, &coefficients.units) {
      Some(UnitResolution::Same) => event.raw_data.clone(),
      Some(UnitResolution::Converted(multiplier)) => &event.raw_data * &multiplier,
      None => {
        return Err(CalculationError::UnitMismatch {
          event_unit:  event.units.clone(),
          factor_unit: coefficients.units.clone(),
        });
      }
    };

    let principal = coefficients
      .kgco2e(self.standard)
      .ok_or_else(|| incomplete(format!("{} kgCO2e factor", self.standard.as_str())))?;

    let scale = self.mass_unit.scale();
    let unit = self.mass_unit.label();
    let mut co2e = BigDecimal::from(0);
    let mut amounts: [Option<Quantity>; 3] = [None, None, None];

    for (slot, gas) in amounts.iter_mut().zip(Gas::ALL) {
      let Some(coefficient) = coefficients.gas(gas) else {
        continue;
      };
      let gwp = self.gwp.multiplier(gas).ok_or_else(|| {
        incomplete(format!("{} GWP for {}", self.standard.as_str(), gas.as_str()))
      })?;
      let amount = to_column(&(&quantity * coefficient * &scale), amount_field(gas))?;
      co2e = co2e + &amount * &gwp;
      *slot = Some(Quantity { amount, unit: unit.to_owned() });
    }

    if amounts.iter().all(Option::is_none) {
      return Err(incomplete("co2, ch4 and n2o coefficients".into()));
    }

    let [co2, ch4, n2o] = amounts;
    let emission = CalculatedEmission {
      event: event.clone(),
      co2e: Quantity {
        amount: to_column(&co2e, "co2e_amount")?,
        unit:   unit.to_owned(),
      },
      co2,
      ch4,
      n2o,
      emissions_factor: Quantity {
        amount: to_column(principal, "emissions_factor_amount")?,
        unit:   format!("kgCO2e/{}", coefficients.units),
      },
    };

    debug!(
      event = %event.activity_event_id,
      factor = %key,
      co2e = %decimal::to_plain(&emission.co2e.amount),
      "computed emissions"
    );
    Ok(emission)
  }
}

fn amount_field(gas: Gas) -> &'static str {
  match gas {
    Gas::Co2 => "co2_amount",
    Gas::Ch4 => "ch4_amount",
    Gas::N2o => "n2o_amount",
  }
}

fn to_column(value: &BigDecimal, field: &'static str) -> Result<BigDecimal, CalculationError> {
  decimal::to_column_scale(value).ok_or_else(|| CalculationError::PrecisionOverflow {
    field,
    value: decimal::to_plain(value),
  })
}
