//! Numeric-id backfill
//!
//! Gives every galaxy without a `numeric_id` the next free one, one store
//! batch at a time. Updates go through `GalaxyTable`, so the numericId
//! index moves with them and `max_numeric_id` stays cheap.

use serde::Serialize;

use super::errors::{BackfillError, BackfillResult};
use crate::observability::{log_event, Event};
use crate::record::{next_numeric_id, GalaxyTable, ScanCursor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillBatch {
    pub updated: usize,
    pub scanned: usize,
    pub continue_cursor: Option<String>,
    pub is_done: bool,
}

pub struct NumericIdBackfill<'a> {
    table: &'a GalaxyTable,
    batch_size: usize,
}

impl<'a> NumericIdBackfill<'a> {
    pub fn new(table: &'a GalaxyTable, batch_size: usize) -> BackfillResult<Self> {
        if batch_size == 0 {
            return Err(BackfillError::BatchSizeInvalid);
        }
        Ok(Self { table, batch_size })
    }

    pub fn run_batch(&self, cursor: Option<&str>) -> BackfillResult<BackfillBatch> {
        let cursor = ScanCursor::decode_opt(cursor)?;
        let page = self.table.store().scan(cursor, self.batch_size)?;

        let mut updated = 0;
        let mut next = self.table.max_numeric_id()?;
        for (id, galaxy) in &page.records {
            if galaxy.numeric_id.is_some() {
                continue;
            }
            next = next_numeric_id(next)?;
            let mut galaxy = galaxy.clone();
            galaxy.numeric_id = Some(next);
            self.table.update(*id, galaxy)?;
            updated += 1;
        }

        log_event(
            Event::BackfillBatch,
            &[
                ("is_done", if page.is_done { "true" } else { "false" }),
                ("scanned", &page.records.len().to_string()),
                ("updated", &updated.to_string()),
            ],
        );
        Ok(BackfillBatch {
            updated,
            scanned: page.records.len(),
            continue_cursor: page.continue_cursor.map(|c| c.encode()),
            is_done: page.is_done,
        })
    }

    /// Runs batches until the scan is done. Returns the total updated.
    pub fn run_to_completion(&self) -> BackfillResult<usize> {
        let mut cursor: Option<String> = None;
        let mut total = 0;
        loop {
            let batch = self.run_batch(cursor.as_deref())?;
            total += batch.updated;
            if batch.is_done {
                return Ok(total);
            }
            cursor = batch.continue_cursor;
        }
    }
}
