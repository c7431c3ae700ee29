//! The closed set of maintained indexes and their key extractors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::IndexError;
use super::key::{IndexKey, KeyKind, MISSING_SORTS_LAST};
use crate::record::{Field, Galaxy};

/// Computes a record's key for one index. `None` means the value cannot be
/// ordered (NaN).
pub type KeyExtractor = fn(&Galaxy) -> Option<IndexKey>;

/// One order-statistics index per sortable galaxy field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexName {
    Id,
    NumericId,
    Ra,
    Dec,
    Reff,
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

impl IndexName {
    pub const ALL: [IndexName; 15] = [
        IndexName::Id,
        IndexName::NumericId,
        IndexName::Ra,
        IndexName::Dec,
        IndexName::Reff,
        IndexName::Q,
        IndexName::Pa,
        IndexName::Nucleus,
        IndexName::Mag,
        IndexName::MeanMue,
        IndexName::TotalClassifications,
        IndexName::NumVisibleNucleus,
        IndexName::NumAwesomeFlag,
        IndexName::TotalAssigned,
        IndexName::CreatedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        self.field().as_str()
    }

    /// Record field this index orders by
    pub fn field(&self) -> Field {
        match self {
            IndexName::Id => Field::Id,
            IndexName::NumericId => Field::NumericId,
            IndexName::Ra => Field::Ra,
            IndexName::Dec => Field::Dec,
            IndexName::Reff => Field::Reff,
            IndexName::Q => Field::Q,
            IndexName::Pa => Field::Pa,
            IndexName::Nucleus => Field::Nucleus,
            IndexName::Mag => Field::Mag,
            IndexName::MeanMue => Field::MeanMue,
            IndexName::TotalClassifications => Field::TotalClassifications,
            IndexName::NumVisibleNucleus => Field::NumVisibleNucleus,
            IndexName::NumAwesomeFlag => Field::NumAwesomeFlag,
            IndexName::TotalAssigned => Field::TotalAssigned,
            IndexName::CreatedAt => Field::CreatedAt,
        }
    }

    /// Index maintained for a field, if any
    pub fn for_field(field: Field) -> Option<IndexName> {
        IndexName::ALL.into_iter().find(|n| n.field() == field)
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            IndexName::Id => KeyKind::Str,
            IndexName::Nucleus => KeyKind::Bool,
            IndexName::NumericId
            | IndexName::TotalClassifications
            | IndexName::NumVisibleNucleus
            | IndexName::NumAwesomeFlag
            | IndexName::TotalAssigned
            | IndexName::CreatedAt => KeyKind::Int,
            IndexName::Ra
            | IndexName::Dec
            | IndexName::Reff
            | IndexName::Q
            | IndexName::Pa
            | IndexName::Mag
            | IndexName::MeanMue => KeyKind::Float,
        }
    }

    pub fn extractor(&self) -> KeyExtractor {
        match self {
            IndexName::Id => |g: &Galaxy| Some(IndexKey::string(g.id.clone())),
            IndexName::NumericId => |g: &Galaxy| Some(IndexKey::int(g.numeric_id.unwrap_or(MISSING_SORTS_LAST))),
            IndexName::Ra => |g: &Galaxy| IndexKey::float(g.ra),
            IndexName::Dec => |g: &Galaxy| IndexKey::float(g.dec),
            IndexName::Reff => |g: &Galaxy| IndexKey::float(g.reff),
            IndexName::Q => |g: &Galaxy| IndexKey::float(g.q),
            IndexName::Pa => |g: &Galaxy| IndexKey::float(g.pa),
            IndexName::Nucleus => |g: &Galaxy| Some(IndexKey::Bool(g.nucleus)),
            IndexName::Mag => |g: &Galaxy| IndexKey::float(g.mag.unwrap_or(MISSING_SORTS_LAST as f64)),
            IndexName::MeanMue => {
                |g: &Galaxy| IndexKey::float(g.mean_mue.unwrap_or(MISSING_SORTS_LAST as f64))
            }
            IndexName::TotalClassifications => {
                |g: &Galaxy| Some(IndexKey::int(g.total_classifications.unwrap_or(0)))
            }
            IndexName::NumVisibleNucleus => |g: &Galaxy| Some(IndexKey::int(g.num_visible_nucleus.unwrap_or(0))),
            IndexName::NumAwesomeFlag => |g: &Galaxy| Some(IndexKey::int(g.num_awesome_flag.unwrap_or(0))),
            IndexName::TotalAssigned => |g: &Galaxy| Some(IndexKey::int(g.total_assigned.unwrap_or(0))),
            IndexName::CreatedAt => |g: &Galaxy| Some(IndexKey::int(g.created_at)),
        }
    }

    /// Extracts the key or reports why it is not orderable
    pub fn key_for(&self, galaxy: &Galaxy) -> Result<IndexKey, IndexError> {
        (self.extractor())(galaxy).ok_or_else(|| IndexError::InvalidKey {
            index: *self,
            reason: format!("record '{}' has a non-orderable {}", galaxy.id, self),
        })
    }
}

/// Sort key for any field, indexed or not. Unindexed fields are only sorted
/// by the browse fallback scan.
pub fn sort_key(field: Field, galaxy: &Galaxy) -> Option<IndexKey> {
    match IndexName::for_field(field) {
        Some(name) => (name.extractor())(galaxy),
        None => match field {
            Field::ReffPixels => IndexKey::float(galaxy.reff_pixels),
            _ => None,
        },
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexName {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexName::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| IndexError::UnknownName(s.to_string()))
    }
}
