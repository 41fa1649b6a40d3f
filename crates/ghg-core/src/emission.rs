//! Calculation output and rejection reports.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{decimal, event::ActivityEvent};

/// An amount with its unit. Amounts are always at the column scale
/// ([`decimal::SCALE`] fractional digits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
  #[serde(with = "decimal::serde_plain")]
  pub amount: BigDecimal,
  pub unit:   String,
}

/// The result of a successful calculation for one [`ActivityEvent`].
///
/// A gas whose coefficient is unavailable has `None` here rather than zero
/// and did not contribute to `co2e`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedEmission {
  pub event:            ActivityEvent,
  pub co2e:             Quantity,
  pub co2:              Option<Quantity>,
  pub ch4:              Option<Quantity>,
  pub n2o:              Option<Quantity>,
  /// The combined per-unit factor applied, kept for auditability.
  pub emissions_factor: Quantity,
}

impl CalculatedEmission {
  pub fn activity_event_id(&self) -> &str { &self.event.activity_event_id }
}

/// An event that produced no [`CalculatedEmission`], kept for manual triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
  pub run_id:            Uuid,
  /// The event id, or `line:<n>` when the input line could not be parsed.
  pub activity_event_id: String,
  /// Stable error code, e.g. `unresolved_factor`.
  pub kind:              String,
  pub message:           String,
  pub recorded_at:       DateTime<Utc>,
}
