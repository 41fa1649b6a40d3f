//! Enriched JSON-lines output: each input event written back with an
//! `emissions_output` block appended.

use std::io::Write;

use ghg_core::{
  emission::{CalculatedEmission, Quantity},
  event::ActivityEvent,
};
use serde::Serialize;

use crate::Result;

#[derive(Serialize)]
struct Enriched<'a> {
  #[serde(flatten)]
  event:            &'a ActivityEvent,
  emissions_output: EmissionsOutput<'a>,
}

#[derive(Serialize)]
struct EmissionsOutput<'a> {
  calculated_emissions: Gases<'a>,
  emissions_factor:     &'a Quantity,
}

/// An unavailable gas is written as `null`, never as zero.
#[derive(Serialize)]
struct Gases<'a> {
  co2:  Option<&'a Quantity>,
  ch4:  Option<&'a Quantity>,
  n2o:  Option<&'a Quantity>,
  co2e: &'a Quantity,
}

impl<'a> From<&'a CalculatedEmission> for Enriched<'a> {
  fn from(e: &'a CalculatedEmission) -> Self {
    Self {
      event:            &e.event,
      emissions_output: EmissionsOutput {
        calculated_emissions: Gases {
          co2:  e.co2.as_ref(),
          ch4:  e.ch4.as_ref(),
          n2o:  e.n2o.as_ref(),
          co2e: &e.co2e,
        },
        emissions_factor:     &e.emissions_factor,
      },
    }
  }
}

/// Write one line per emission to `writer`.
pub fn write_enriched<W: Write>(mut writer: W, emissions: &[CalculatedEmission]) -> Result<()> {
  for emission in emissions {
    serde_json::to_writer(&mut writer, &Enriched::from(emission))?;
    writer.write_all(b"\n")?;
  }
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use ghg_core::{calculate::Calculator, factor::RawFactorRecord, gwp::GwpStandard};
  use serde_json::Value;

  use super::*;

  fn emission() -> CalculatedEmission {
    let factor: RawFactorRecord = serde_json::from_str(
      r#"{
        "category": "mobile-combustion",
        "activity": "Diesel Fuel - Diesel Fuel",
        "scope": 1,
        "emissions_factor_standards": {"ghg": {"coefficients": {
          "co2_factor": "10.21", "ch4_factor": "", "n2o_factor": "",
          "AR4-kgco2e": "10.21", "AR5-kgco2e": "10.21", "units": "gallon"
        }}}
      }"#,
    )
    .unwrap();
    let event = ActivityEvent::from_json(
      r#"{"activity_event_id": "e1", "asset_id": "vehicle-1", "scope": 1,
          "category": "mobile-combustion", "activity": "Diesel Fuel - Diesel Fuel",
          "raw_data": 2, "units": "gallons", "supplier": "acme"}"#,
    )
    .unwrap();
    Calculator::new(GwpStandard::Ar5)
      .compute(&event, &factor.into_record().unwrap())
      .unwrap()
  }

  #[test]
  fn lines_keep_input_fields_and_append_emissions_output() {
    let mut buf = Vec::new();
    write_enriched(&mut buf, &[emission(), emission()]).unwrap();

    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let v: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(v["activity_event_id"], "e1");
    assert_eq!(v["asset_id"], "vehicle-1");
    assert_eq!(v["supplier"], "acme");
    assert_eq!(v["raw_data"], "2");

    let out = &v["emissions_output"];
    assert_eq!(out["calculated_emissions"]["co2"]["amount"], "20.4200000000000000");
    assert_eq!(out["calculated_emissions"]["co2"]["unit"], "kg");
    assert!(out["calculated_emissions"]["ch4"].is_null());
    assert_eq!(out["calculated_emissions"]["co2e"]["amount"], "20.4200000000000000");
    assert_eq!(out["emissions_factor"]["amount"], "10.2100000000000000");
    assert_eq!(out["emissions_factor"]["unit"], "kgCO2e/gallon");
  }
}
