use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single spreadsheet cell after import.
///
/// Uploaded sheets arrive with whatever the reader produced: real numbers,
/// numbers-as-text, textual "nan" artifacts, whitespace padding. Everything
/// downstream (aggregation, dedup) works on this canonical form, so
/// [`CellValue::normalize`] is the only place that cleanup happens.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Collapse reader artifacts into the canonical form.
    ///
    /// - NaN / ±Inf numbers become Empty
    /// - text is trimmed; "nan" (any case) and whitespace-only become Empty
    /// - finite numbers pass through untouched (no rounding)
    pub fn normalize(self) -> CellValue {
        match self {
            CellValue::Number(n) if !n.is_finite() => CellValue::Empty,
            CellValue::Number(n) => CellValue::Number(n),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                    CellValue::Empty
                } else if trimmed.len() == s.len() {
                    CellValue::Text(s)
                } else {
                    CellValue::Text(trimmed.to_string())
                }
            }
            CellValue::Empty => CellValue::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric coercion. Empty and non-numeric text yield None; callers
    /// decide whether that means "skip" (sums) or "fail-safe" (flags).
    /// Text parsing to NaN/Inf ("nan", "inf") counts as a failure so a
    /// single stray cell can never poison an aggregate.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => n.is_finite().then_some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Empty => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Display form: numbers render integers without decimals.
    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_display())
    }
}

// Raw row snapshots are stored as JSON arrays; the wire form is
// null | string | number so snapshots stay readable from any tool.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_unit(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = CellValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("null, string, number, or bool")
            }

            fn visit_unit<E: de::Error>(self) -> Result<CellValue, E> {
                Ok(CellValue::Empty)
            }

            fn visit_none<E: de::Error>(self) -> Result<CellValue, E> {
                Ok(CellValue::Empty)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<CellValue, D::Error> {
                CellValue::deserialize(d)
            }

            fn visit_f64<E: de::Error>(self, n: f64) -> Result<CellValue, E> {
                Ok(CellValue::Number(n))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<CellValue, E> {
                Ok(CellValue::Number(n as f64))
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<CellValue, E> {
                Ok(CellValue::Number(n as f64))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<CellValue, E> {
                Ok(CellValue::Text(s.to_string()))
            }

            fn visit_string<E: de::Error>(self, s: String) -> Result<CellValue, E> {
                Ok(CellValue::Text(s))
            }

            fn visit_bool<E: de::Error>(self, b: bool) -> Result<CellValue, E> {
                Ok(CellValue::Text(if b { "TRUE" } else { "FALSE" }.to_string()))
            }
        }

        deserializer.deserialize_any(CellVisitor)
    }
}
