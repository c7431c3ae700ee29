//! The galaxy record and its typed fields

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{RecordError, RecordResult};
use crate::index::MISSING_SORTS_LAST;

/// Store-assigned primary key. Monotonic, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub const MIN: RecordId = RecordId(0);
    pub const MAX: RecordId = RecordId(u64::MAX);
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the galaxy catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Galaxy {
    /// External catalogue id
    pub id: String,
    #[serde(default)]
    pub numeric_id: Option<i64>,
    pub ra: f64,
    pub dec: f64,
    pub reff: f64,
    #[serde(default)]
    pub reff_pixels: f64,
    pub q: f64,
    pub pa: f64,
    pub nucleus: bool,
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default, alias = "mean_mue")]
    pub mean_mue: Option<f64>,
    #[serde(default)]
    pub total_classifications: Option<i64>,
    #[serde(default)]
    pub num_visible_nucleus: Option<i64>,
    #[serde(default)]
    pub num_awesome_flag: Option<i64>,
    #[serde(default)]
    pub total_assigned: Option<i64>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: i64,
}

impl Galaxy {
    /// Minimal record with the required numeric fields zeroed
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            numeric_id: None,
            ra: 0.0,
            dec: 0.0,
            reff: 0.0,
            reff_pixels: 0.0,
            q: 0.0,
            pa: 0.0,
            nucleus: false,
            mag: None,
            mean_mue: None,
            total_classifications: None,
            num_visible_nucleus: None,
            num_awesome_flag: None,
            total_assigned: None,
            created_at: 0,
        }
    }

    /// Rejects records that cannot be indexed
    pub fn validate(&self) -> RecordResult<()> {
        if self.id.is_empty() {
            return Err(RecordError::InvalidRecord("id must not be empty".into()));
        }
        // The top of the range is the numericId index's missing-value key
        if let Some(n) = self.numeric_id {
            if !(0..MISSING_SORTS_LAST).contains(&n) {
                return Err(RecordError::InvalidRecord(format!(
                    "numericId {} outside 0..{}",
                    n, MISSING_SORTS_LAST
                )));
            }
        }
        for field in Field::ALL {
            if let Some(FieldValue::Float(v)) = self.value(field) {
                if v.is_nan() {
                    return Err(RecordError::InvalidRecord(format!(
                        "{} must not be NaN",
                        field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Typed value of a field. Absent optional measurements return `None`;
    /// absent counters read as zero.
    pub fn value(&self, field: Field) -> Option<FieldValue<'_>> {
        match field {
            Field::Id => Some(FieldValue::Str(&self.id)),
            Field::NumericId => self.numeric_id.map(FieldValue::Int),
            Field::Ra => Some(FieldValue::Float(self.ra)),
            Field::Dec => Some(FieldValue::Float(self.dec)),
            Field::Reff => Some(FieldValue::Float(self.reff)),
            Field::ReffPixels => Some(FieldValue::Float(self.reff_pixels)),
            Field::Q => Some(FieldValue::Float(self.q)),
            Field::Pa => Some(FieldValue::Float(self.pa)),
            Field::Nucleus => Some(FieldValue::Bool(self.nucleus)),
            Field::Mag => self.mag.map(FieldValue::Float),
            Field::MeanMue => self.mean_mue.map(FieldValue::Float),
            Field::TotalClassifications => {
                Some(FieldValue::Int(self.total_classifications.unwrap_or(0)))
            }
            Field::NumVisibleNucleus => Some(FieldValue::Int(self.num_visible_nucleus.unwrap_or(0))),
            Field::NumAwesomeFlag => Some(FieldValue::Int(self.num_awesome_flag.unwrap_or(0))),
            Field::TotalAssigned => Some(FieldValue::Int(self.total_assigned.unwrap_or(0))),
            Field::CreatedAt => Some(FieldValue::Int(self.created_at)),
        }
    }
}

/// Borrowed view of a field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue<'_> {
    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Type of values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Number,
    Bool,
}

/// Every filterable / sortable column of a galaxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Id,
    NumericId,
    Ra,
    Dec,
    Reff,
    ReffPixels,
    Q,
    Pa,
    Nucleus,
    Mag,
    MeanMue,
    TotalClassifications,
    NumVisibleNucleus,
    NumAwesomeFlag,
    TotalAssigned,
    CreatedAt,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Id,
        Field::NumericId,
        Field::Ra,
        Field::Dec,
        Field::Reff,
        Field::ReffPixels,
        Field::Q,
        Field::Pa,
        Field::Nucleus,
        Field::Mag,
        Field::MeanMue,
        Field::TotalClassifications,
        Field::NumVisibleNucleus,
        Field::NumAwesomeFlag,
        Field::TotalAssigned,
        Field::CreatedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::NumericId => "numericId",
            Field::Ra => "ra",
            Field::Dec => "dec",
            Field::Reff => "reff",
            Field::ReffPixels => "reffPixels",
            Field::Q => "q",
            Field::Pa => "pa",
            Field::Nucleus => "nucleus",
            Field::Mag => "mag",
            Field::MeanMue => "meanMue",
            Field::TotalClassifications => "totalClassifications",
            Field::NumVisibleNucleus => "numVisibleNucleus",
            Field::NumAwesomeFlag => "numAwesomeFlag",
            Field::TotalAssigned => "totalAssigned",
            Field::CreatedAt => "createdAt",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Id => FieldType::Str,
            Field::Nucleus => FieldType::Bool,
            _ => FieldType::Number,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| RecordError::InvalidRecord(format!("unknown field '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_default_to_zero() {
        let g = Galaxy::new("g1");
        assert_eq!(g.value(Field::TotalAssigned), Some(FieldValue::Int(0)));
        assert_eq!(g.value(Field::Mag), None);
        assert_eq!(g.value(Field::NumericId), None);
    }

    #[test]
    fn test_deserialize_camel_case_and_alias() {
        let g: Galaxy = serde_json::from_str(
            r#"{"id":"a","ra":1.5,"dec":-2,"reff":3,"q":0.5,"pa":10,"nucleus":true,"mean_mue":21.5,"numericId":4}"#,
        )
        .unwrap();
        assert_eq!(g.mean_mue, Some(21.5));
        assert_eq!(g.numeric_id, Some(4));
        assert!(g.nucleus);
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut g = Galaxy::new("a");
        g.ra = f64::NAN;
        assert!(matches!(g.validate(), Err(RecordError::InvalidRecord(_))));
        assert!(Galaxy::new("").validate().is_err());
    }

    #[test]
    fn test_field_parse_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
        }
        assert!("colour".parse::<Field>().is_err());
    }
}
