//! Fixed-point decimal helpers.
//!
//! All quantities are [`BigDecimal`]s. Output columns are DECIMAL(32,16):
//! at most 16 integer digits and exactly 16 fractional digits. Values are
//! never routed through `f64`: event amounts are parsed from the literal
//! digits of the source document.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};

use crate::{Error, Result};

/// Fractional digits carried by every output amount.
pub const SCALE: i64 = 16;

/// Integer digits permitted by a DECIMAL(32,16) column.
pub const INTEGER_DIGITS: u32 = 16;

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a decimal literal. Surrounding whitespace is ignored.
pub fn parse(s: &str) -> Result<BigDecimal> {
  BigDecimal::from_str(s.trim()).map_err(|_| Error::InvalidDecimal(s.to_owned()))
}

/// Parse a coefficient that may be left empty in the reference data.
///
/// An empty (or all-whitespace) string means "unavailable" and yields `None`;
/// it is never read as zero.
pub fn parse_optional(s: &str) -> Result<Option<BigDecimal>> {
  if s.trim().is_empty() {
    return Ok(None);
  }
  parse(s).map(Some)
}

/// Convert a JSON scalar (number or string) into a decimal.
///
/// A [`serde_json::Number`] holds at most `f64` precision once parsed; use
/// [`from_json_literal`] when the source text is at hand.
pub fn from_json(value: &serde_json::Value) -> Result<Option<BigDecimal>> {
  match value {
    serde_json::Value::Null => Ok(None),
    serde_json::Value::Number(n) => parse(&n.to_string()).map(Some),
    serde_json::Value::String(s) => parse_optional(s),
    other => Err(Error::InvalidDecimal(other.to_string())),
  }
}

/// Convert the source text of a JSON scalar into a decimal. Number literals
/// are parsed digit for digit; strings and `null` follow [`from_json`].
pub fn from_json_literal(text: &str) -> Result<Option<BigDecimal>> {
  let text = text.trim();
  if text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
    return parse(text).map(Some);
  }
  from_json(&serde_json::from_str(text)?)
}

// ─── Output precision ────────────────────────────────────────────────────────

fn integer_limit() -> BigDecimal { BigDecimal::from(10_u64.pow(INTEGER_DIGITS)) }

/// Number of significant fractional digits, ignoring trailing zeros.
fn fractional_digits(value: &BigDecimal) -> i64 {
  let (_, exponent) = value.normalized().as_bigint_and_exponent();
  exponent.max(0)
}

/// Whether `value` can be stored in a DECIMAL(32,16) column without loss.
pub fn fits_column(value: &BigDecimal) -> bool {
  value.abs() < integer_limit() && fractional_digits(value) <= SCALE
}

/// Round half-to-even to [`SCALE`] fractional digits. Returns `None` when the
/// integer part needs more than [`INTEGER_DIGITS`] digits.
pub fn to_column_scale(value: &BigDecimal) -> Option<BigDecimal> {
  let rounded = value.with_scale_round(SCALE, RoundingMode::HalfEven);
  (rounded.abs() < integer_limit()).then_some(rounded)
}

/// Render without exponent notation, keeping every digit of the scale.
pub fn to_plain(value: &BigDecimal) -> String { value.to_plain_string() }

// ─── Serde adapters ──────────────────────────────────────────────────────────

/// Serialises a [`BigDecimal`] as a plain string; deserialises from a JSON
/// number or string.
pub mod serde_plain {
  use bigdecimal::BigDecimal;
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    value: &BigDecimal,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&super::to_plain(value))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<BigDecimal, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    super::from_json(&raw)
      .map_err(D::Error::custom)?
      .ok_or_else(|| D::Error::custom("missing decimal value"))
  }
}

/// Like [`serde_plain`] for `Option<BigDecimal>`. `null` and `""` both read
/// as `None`.
pub mod serde_plain_opt {
  use bigdecimal::BigDecimal;
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    value: &Option<BigDecimal>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match value {
      Some(v) => serializer.serialize_str(&super::to_plain(v)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<BigDecimal>, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    super::from_json(&raw).map_err(D::Error::custom)
  }
}
