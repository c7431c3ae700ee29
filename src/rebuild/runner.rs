//! One stage's clear and rebuild batches
//!
//! A runner holds the index's rebuild lease, so no other rebuild can touch
//! the index while it works. Live writes still can, which is how the
//! duplicate-key race arises: a record written after the clear is indexed
//! by the write path, then collides when the scan reaches it.
//!
//! Each batch is all-or-nothing. A failed rebuild batch removes whatever it
//! inserted before returning, so `processed` always matches the last
//! completed batch.

use serde::Serialize;

use super::errors::{RebuildError, RebuildResult};
use super::state::{RebuildStage, StageStatus};
use crate::index::{IndexError, IndexKey, IndexName, OrderStatisticsIndex, RebuildLease};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::record::{RecordId, RecordStore, ScanCursor};

#[derive(Debug, Clone, Copy)]
pub struct BatchSizes {
    pub clear: usize,
    pub rebuild: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            clear: 500,
            rebuild: 50,
        }
    }
}

/// Result of one rebuild batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildBatch {
    pub processed: usize,
    pub is_done: bool,
    pub continue_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The stage needs more steps
    Continue,
    /// The stage is done or failed
    Finished,
}

pub struct StageRunner<'a> {
    lease: &'a RebuildLease,
    store: &'a dyn RecordStore,
    sizes: BatchSizes,
    metrics: &'a MetricsRegistry,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        lease: &'a RebuildLease,
        store: &'a dyn RecordStore,
        sizes: BatchSizes,
        metrics: &'a MetricsRegistry,
    ) -> Self {
        Self {
            lease,
            store,
            sizes,
            metrics,
        }
    }

    pub fn index(&self) -> IndexName {
        self.lease.slot().name()
    }

    /// Removes one batch of entries. Returns how many were removed.
    pub fn clear_batch(&self) -> RebuildResult<usize> {
        let removed = self.lease.slot().write()?.clear_batch(self.sizes.clear);
        self.metrics.add_index_entries_removed(removed as u64);
        Ok(removed)
    }

    /// Empties the index completely, batch by batch
    pub fn clear_all(&self) -> RebuildResult<usize> {
        let mut total = 0;
        loop {
            let removed = self.clear_batch()?;
            total += removed;
            if removed < self.sizes.clear {
                log_event(
                    Event::ClearComplete,
                    &[("index", self.index().as_str()), ("removed", &total.to_string())],
                );
                return Ok(total);
            }
        }
    }

    /// Indexes the next batch of records after `cursor`. Does not clear.
    pub fn rebuild_batch(&self, cursor: Option<ScanCursor>) -> RebuildResult<RebuildBatch> {
        let slot = self.lease.slot();
        let page = self.store.scan(cursor, self.sizes.rebuild)?;
        let keys = page
            .records
            .iter()
            .map(|(id, galaxy)| Ok((*id, slot.key_for(galaxy)?)))
            .collect::<Result<Vec<(RecordId, IndexKey)>, IndexError>>()?;

        {
            let mut index = slot.write()?;
            let mut inserted: Vec<RecordId> = Vec::with_capacity(keys.len());
            for (id, key) in keys {
                if let Err(e) = index.insert(key, id) {
                    roll_back(&mut index, &inserted);
                    if matches!(e, IndexError::DuplicateKey { .. }) {
                        self.metrics.increment_duplicate_key_failures();
                        log_event(
                            Event::DuplicateKey,
                            &[("index", self.index().as_str()), ("record", &id.to_string())],
                        );
                    }
                    return Err(e.into());
                }
                inserted.push(id);
            }
        }

        let processed = page.records.len();
        self.metrics.increment_rebuild_batches();
        self.metrics.add_index_entries_inserted(processed as u64);
        log_event(
            Event::RebuildBatch,
            &[
                ("index", self.index().as_str()),
                ("processed", &processed.to_string()),
            ],
        );
        Ok(RebuildBatch {
            processed,
            is_done: page.is_done,
            continue_cursor: page.continue_cursor.map(|c| c.encode()),
        })
    }

    /// Advances the stage by exactly one unit of work: a transition, one
    /// clear batch, or one rebuild batch. Batch errors fail the stage.
    pub fn step(&self, stage: &mut RebuildStage) -> StepOutcome {
        let name = self.index();
        match self.advance(stage) {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = self.describe_failure(stage, &e);
                if stage.fail(name, reason).is_err() {
                    // Only reachable if the error came from a terminal stage
                    stage.error = Some(e.to_string());
                }
                StepOutcome::Finished
            }
        }
    }

    fn advance(&self, stage: &mut RebuildStage) -> RebuildResult<StepOutcome> {
        let name = self.index();
        match stage.status {
            StageStatus::Pending => {
                stage.transition(name, StageStatus::Clearing)?;
                Ok(StepOutcome::Continue)
            }
            StageStatus::Clearing => {
                let removed = self.clear_batch()?;
                stage.cleared += removed;
                if removed < self.sizes.clear {
                    log_event(
                        Event::ClearComplete,
                        &[("index", name.as_str()), ("removed", &stage.cleared.to_string())],
                    );
                    stage.transition(name, StageStatus::Rebuilding)?;
                }
                Ok(StepOutcome::Continue)
            }
            StageStatus::Rebuilding => {
                let cursor = ScanCursor::decode_opt(stage.cursor.as_deref())?;
                let batch = self.rebuild_batch(cursor)?;
                stage.processed += batch.processed;
                stage.cursor = batch.continue_cursor;
                if batch.is_done {
                    stage.transition(name, StageStatus::Done)?;
                    Ok(StepOutcome::Finished)
                } else {
                    Ok(StepOutcome::Continue)
                }
            }
            StageStatus::Done | StageStatus::Failed => Ok(StepOutcome::Finished),
        }
    }

    fn describe_failure(&self, stage: &RebuildStage, err: &RebuildError) -> String {
        match err {
            RebuildError::Index(IndexError::DuplicateKey { record, .. }) => format!(
                "duplicate key for record {} in index {} after {} records processed: \
                 concurrent write during rebuild; pause writes and retry",
                record,
                self.index(),
                stage.processed
            ),
            other => format!("{} (after {} records processed)", other, stage.processed),
        }
    }
}

/// Removes the entries a failed batch inserted. Returns how many could not
/// be removed; each one is logged, since the batch is then only partly undone.
fn roll_back(index: &mut OrderStatisticsIndex, inserted: &[RecordId]) -> usize {
    let mut stranded = 0;
    for id in inserted {
        if let Err(e) = index.delete(*id) {
            stranded += 1;
            log_event(
                Event::RollbackFailed,
                &[
                    ("error", &e.to_string()),
                    ("index", index.name().as_str()),
                    ("record", &id.to_string()),
                ],
            );
        }
    }
    stranded
}
