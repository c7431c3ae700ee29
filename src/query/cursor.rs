//! Opaque pagination cursors
//!
//! A cursor records the boundary `(key, record)` of the page that minted it
//! and which way to continue. It is bound to the sort field, sort order and
//! filter fingerprint of its query; replaying it against a different query
//! is rejected. Tokens are URL-safe base64 of a small JSON payload.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::{QueryError, QueryResult};
use crate::index::{Entry, IndexKey};
use crate::record::{Field, RecordId};

const CURSOR_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Which side of the anchor the next page lies on, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    After,
    Before,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseCursor {
    v: u8,
    pub sort: Field,
    pub order: SortOrder,
    pub filters: String,
    pub direction: Direction,
    pub key: IndexKey,
    pub record: RecordId,
}

impl BrowseCursor {
    pub fn new(
        sort: Field,
        order: SortOrder,
        filters: String,
        direction: Direction,
        anchor: &Entry,
    ) -> Self {
        Self {
            v: CURSOR_VERSION,
            sort,
            order,
            filters,
            direction,
            key: anchor.key.clone(),
            record: anchor.id,
        }
    }

    pub fn anchor(&self) -> Entry {
        Entry::new(self.key.clone(), self.record)
    }

    pub fn encode(&self) -> String {
        // Serializing plain data into a Vec cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> QueryResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| QueryError::CursorInvalid(format!("not a cursor token: {}", e)))?;
        let cursor: BrowseCursor = serde_json::from_slice(&bytes)
            .map_err(|e| QueryError::CursorInvalid(format!("malformed cursor: {}", e)))?;
        if cursor.v != CURSOR_VERSION {
            return Err(QueryError::CursorInvalid(format!(
                "cursor format v{} is no longer supported",
                cursor.v
            )));
        }
        Ok(cursor)
    }

    /// Decodes and checks the cursor belongs to this query
    pub fn decode_for(
        token: &str,
        sort: Field,
        order: SortOrder,
        fingerprint: &str,
    ) -> QueryResult<Self> {
        let cursor = Self::decode(token)?;
        if cursor.sort != sort || cursor.order != order || cursor.filters != fingerprint {
            return Err(QueryError::CursorInvalid(
                "cursor was minted for a different sort or filter set".into(),
            ));
        }
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> BrowseCursor {
        BrowseCursor::new(
            Field::Ra,
            SortOrder::Desc,
            "abc".into(),
            Direction::After,
            &Entry::new(IndexKey::float(12.5).unwrap(), RecordId(77)),
        )
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = cursor().encode();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(BrowseCursor::decode(&token).unwrap(), cursor());
    }

    #[test]
    fn test_mismatched_query_rejected() {
        let token = cursor().encode();
        assert!(BrowseCursor::decode_for(&token, Field::Ra, SortOrder::Desc, "abc").is_ok());
        for (sort, order, fp) in [
            (Field::Dec, SortOrder::Desc, "abc"),
            (Field::Ra, SortOrder::Asc, "abc"),
            (Field::Ra, SortOrder::Desc, "xyz"),
        ] {
            assert!(matches!(
                BrowseCursor::decode_for(&token, sort, order, fp),
                Err(QueryError::CursorInvalid(_))
            ));
        }
    }

    #[test]
    fn test_garbage_and_old_versions_rejected() {
        assert!(matches!(
            BrowseCursor::decode("%%%"),
            Err(QueryError::CursorInvalid(_))
        ));
        let mut old = cursor();
        old.v = 0;
        assert!(matches!(
            BrowseCursor::decode(&old.encode()),
            Err(QueryError::CursorInvalid(_))
        ));
    }
}
