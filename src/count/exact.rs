//! Exact count driver
//!
//! Repeats `count_batch` until the store is exhausted, checking a stop
//! signal before every batch. Stopping is an outcome, not an error: the
//! partial total covers exactly the batches that completed.

use serde::Serialize;

use super::errors::CountResult;
use super::estimator::CountEstimator;
use crate::observability::{log_event, Event};
use crate::query::FilterSet;
use crate::record::StopSignal;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CountOutcome {
    Complete {
        total: usize,
        batches: usize,
    },
    #[serde(rename_all = "camelCase")]
    Interrupted {
        partial: usize,
        batches: usize,
        resume_cursor: Option<String>,
    },
}

/// Progress after one completed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountProgress {
    pub batches: usize,
    pub matched: usize,
    pub scanned: usize,
}

pub struct ExactCountScan<'a> {
    estimator: &'a CountEstimator,
    filters: FilterSet,
    batch_size: Option<usize>,
    stop: StopSignal,
}

impl<'a> ExactCountScan<'a> {
    pub fn new(estimator: &'a CountEstimator, filters: FilterSet) -> Self {
        Self {
            estimator,
            filters,
            batch_size: None,
            stop: StopSignal::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Shares an externally owned stop signal
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn run(&self) -> CountResult<CountOutcome> {
        self.run_with(|_| {})
    }

    /// Runs to completion or until stopped, reporting after each batch
    pub fn run_with(&self, mut on_batch: impl FnMut(&CountProgress)) -> CountResult<CountOutcome> {
        let mut cursor: Option<String> = None;
        let mut progress = CountProgress {
            batches: 0,
            matched: 0,
            scanned: 0,
        };

        loop {
            if self.stop.is_stopped() {
                self.estimator.metrics().increment_count_interruptions();
                log_event(
                    Event::CountInterrupted,
                    &[
                        ("batches", &progress.batches.to_string()),
                        ("partial", &progress.matched.to_string()),
                    ],
                );
                return Ok(CountOutcome::Interrupted {
                    partial: progress.matched,
                    batches: progress.batches,
                    resume_cursor: cursor,
                });
            }

            let batch = self
                .estimator
                .count_batch(&self.filters, cursor.as_deref(), self.batch_size)?;
            progress.batches += 1;
            progress.matched += batch.matched_in_batch;
            progress.scanned += batch.scanned;
            on_batch(&progress);

            if batch.is_done {
                log_event(
                    Event::CountComplete,
                    &[
                        ("batches", &progress.batches.to_string()),
                        ("total", &progress.matched.to_string()),
                    ],
                );
                return Ok(CountOutcome::Complete {
                    total: progress.matched,
                    batches: progress.batches,
                });
            }
            cursor = batch.next_cursor;
        }
    }
}
