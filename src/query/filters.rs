//! Range and equality filters over galaxy fields
//!
//! All filters must match (AND). A field with no value (absent `mag`,
//! `meanMue` or `numericId`) never matches any filter. Numbers compare as
//! f64, strings lexicographically, booleans with `false < true`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::{QueryError, QueryResult};
use crate::record::{Field, FieldType, FieldValue, Galaxy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Gt => ord == Ordering::Greater,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lt => ord == Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: Field,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: Field, op: FilterOp, value: FilterValue) -> Self {
        Self { field, op, value }
    }

    /// Shorthand for numeric bounds
    pub fn number(field: Field, op: FilterOp, value: f64) -> Self {
        Self::new(field, op, FilterValue::Number(value))
    }

    pub fn matches(&self, galaxy: &Galaxy) -> bool {
        let actual = match galaxy.value(self.field) {
            Some(v) => v,
            None => return false,
        };
        let ord = match (&actual, &self.value) {
            (FieldValue::Str(a), FilterValue::Str(b)) => (*a).cmp(b.as_str()),
            (FieldValue::Bool(a), FilterValue::Bool(b)) => a.cmp(b),
            (a, FilterValue::Number(b)) => match a.as_f64().and_then(|a| a.partial_cmp(b)) {
                Some(ord) => ord,
                None => return false,
            },
            _ => return false,
        };
        self.op.accepts(ord)
    }

    fn validate(&self) -> QueryResult<()> {
        let ok = matches!(
            (self.field.field_type(), &self.value),
            (FieldType::Str, FilterValue::Str(_))
                | (FieldType::Bool, FilterValue::Bool(_))
                | (FieldType::Number, FilterValue::Number(_))
        );
        if !ok {
            return Err(QueryError::InvalidFilter(format!(
                "value {:?} does not fit field {}",
                self.value, self.field
            )));
        }
        if let FilterValue::Number(n) = self.value {
            if n.is_nan() {
                return Err(QueryError::InvalidFilter(format!(
                    "NaN bound on {}",
                    self.field
                )));
            }
        }
        Ok(())
    }
}

/// A conjunction of filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(Vec<Filter>);

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> QueryResult<Self> {
        let set = FilterSet(filters);
        set.validate()?;
        Ok(set)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0
    }

    /// Checks every filter's value against its field type
    pub fn validate(&self) -> QueryResult<()> {
        self.0.iter().try_for_each(Filter::validate)
    }

    pub fn matches(&self, galaxy: &Galaxy) -> bool {
        self.0.iter().all(|f| f.matches(galaxy))
    }

    /// Order-independent digest of the filter set, embedded in cursors so a
    /// cursor cannot be replayed against different filters
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self
            .0
            .iter()
            .map(|f| serde_json::to_string(f).unwrap_or_default())
            .collect();
        parts.sort();
        let mut hasher = Sha256::new();
        for part in &parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hasher.finalize()[..12]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
