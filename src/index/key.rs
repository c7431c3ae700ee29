//! Index keys
//!
//! Keys are totally ordered. Floats are stored as order-preserving bits so
//! that `Ord` on the key matches IEEE ordering for every non-NaN value.
//! Kinds never mix inside one index: Bool < Int < Float < Str only matters
//! for the derived `Ord`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single orderable index key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "k", content = "v")]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    /// Order-preserving bit pattern of an f64
    Float(u64),
    Str(String),
}

/// Key space an index is declared over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Bool,
    Int,
    Float,
    Str,
}

/// Largest integer exactly representable as an f64. Absent optional values
/// map here so they sort after every real measurement.
pub const MISSING_SORTS_LAST: i64 = 9_007_199_254_740_991;

impl IndexKey {
    /// Float key. Returns `None` for NaN; `-0.0` is folded into `0.0`.
    pub fn float(v: f64) -> Option<Self> {
        if v.is_nan() {
            return None;
        }
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
        Some(IndexKey::Float(ordered))
    }

    pub fn int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        IndexKey::Str(v.into())
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            IndexKey::Bool(_) => KeyKind::Bool,
            IndexKey::Int(_) => KeyKind::Int,
            IndexKey::Float(_) => KeyKind::Float,
            IndexKey::Str(_) => KeyKind::Str,
        }
    }

    /// Numeric value of an Int or Float key
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndexKey::Int(i) => Some(*i as f64),
            IndexKey::Float(bits) => {
                let raw = if bits >> 63 == 1 { bits & !(1 << 63) } else { !bits };
                Some(f64::from_bits(raw))
            }
            _ => None,
        }
    }

    /// Plain JSON rendering used in summaries and API output
    pub fn to_json(&self) -> Value {
        match self {
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Int(i) => Value::from(*i),
            IndexKey::Float(_) => self.as_f64().map(Value::from).unwrap_or(Value::Null),
            IndexKey::Str(s) => Value::String(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(v: f64) -> IndexKey {
        IndexKey::float(v).unwrap()
    }

    #[test]
    fn test_float_ordering_matches_ieee() {
        let values = [
            f64::NEG_INFINITY,
            -1e300,
            -2.5,
            -f64::MIN_POSITIVE,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            1e300,
            f64::INFINITY,
        ];
        for pair in values.windows(2) {
            assert!(f(pair[0]) < f(pair[1]), "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_nan_rejected_and_negative_zero_folded() {
        assert!(IndexKey::float(f64::NAN).is_none());
        assert_eq!(f(-0.0), f(0.0));
    }

    #[test]
    fn test_float_decodes() {
        for v in [-12.75, 0.0, 3.5, 1e-9, MISSING_SORTS_LAST as f64] {
            assert_eq!(f(v).as_f64(), Some(v));
        }
        assert_eq!(IndexKey::int(7).as_f64(), Some(7.0));
        assert_eq!(IndexKey::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(f(2.5).to_json(), serde_json::json!(2.5));
        assert_eq!(IndexKey::string("abc").to_json(), serde_json::json!("abc"));
        assert_eq!(IndexKey::Bool(false).to_json(), serde_json::json!(false));
    }

    #[test]
    fn test_serde_keeps_exact_bits() {
        let key = f(-123.456);
        let text = serde_json::to_string(&key).unwrap();
        let back: IndexKey = serde_json::from_str(&text).unwrap();
        assert_eq!(back, key);
    }
}
