//! Multi-stage rebuild orchestration
//!
//! The coordinator owns the iteration loop. A caller starts a run (blocking
//! or in the background), polls `status()`, and may `stop()` it; a client
//! disconnecting cannot abandon a run halfway.
//!
//! Stages are driven in chunks of `concurrency`. Every stage in a chunk runs
//! on its own scoped thread and a failure in one never aborts its siblings.
//! The snapshot is persisted after every step and after every chunk.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::errors::{RebuildError, RebuildResult};
use super::persist::RebuildStateStore;
use super::runner::{BatchSizes, RebuildBatch, StageRunner, StepOutcome};
use super::state::{RebuildSnapshot, RebuildStage, StageStatus, STOPPED_BY_OPERATOR};
use crate::index::{IndexName, IndexRegistry, RebuildLease};
use crate::observability::{log_event, Event, MetricsRegistry, ObservationScope};
use crate::record::{RecordStore, ScanCursor, StopSignal};

#[derive(Debug, Clone, Copy)]
pub struct RebuildSettings {
    pub clear_batch_size: usize,
    pub rebuild_batch_size: usize,
    pub default_concurrency: usize,
}

impl Default for RebuildSettings {
    fn default() -> Self {
        Self {
            clear_batch_size: 500,
            rebuild_batch_size: 50,
            default_concurrency: 4,
        }
    }
}

/// Final state of a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Option<Uuid>,
    pub stages: BTreeMap<IndexName, RebuildStage>,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub stopped: bool,
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct PreparedRun {
    _guard: RunGuard,
    leases: Vec<RebuildLease>,
    concurrency: usize,
}

pub struct RebuildCoordinator {
    store: Arc<dyn RecordStore>,
    indexes: Arc<IndexRegistry>,
    state: Arc<dyn RebuildStateStore>,
    metrics: Arc<MetricsRegistry>,
    settings: RebuildSettings,
    snapshot: Mutex<RebuildSnapshot>,
    running: Arc<AtomicBool>,
    stop: StopSignal,
    background: Mutex<Option<JoinHandle<RunReport>>>,
}

impl RebuildCoordinator {
    /// Reloads the persisted snapshot for display. Stages caught mid-flight
    /// by a restart are shown as failed and are not resumed.
    pub fn open(
        store: Arc<dyn RecordStore>,
        indexes: Arc<IndexRegistry>,
        state: Arc<dyn RebuildStateStore>,
        metrics: Arc<MetricsRegistry>,
        settings: RebuildSettings,
    ) -> RebuildResult<Self> {
        if settings.default_concurrency == 0 {
            return Err(RebuildError::InvalidConcurrency(0));
        }
        let mut snapshot = state.load()?.unwrap_or_default();
        let interrupted = snapshot.mark_interrupted();
        if interrupted {
            state.save(&snapshot)?;
        }
        if !snapshot.stages.is_empty() {
            log_event(
                Event::StateRestored,
                &[
                    ("failed", &snapshot.count(StageStatus::Failed).to_string()),
                    ("interrupted", if interrupted { "true" } else { "false" }),
                    ("stages", &snapshot.stages.len().to_string()),
                ],
            );
        }

        Ok(Self {
            store,
            indexes,
            state,
            metrics,
            settings,
            snapshot: Mutex::new(snapshot),
            running: Arc::new(AtomicBool::new(false)),
            stop: StopSignal::new(),
            background: Mutex::new(None),
        })
    }

    /// Shares an externally owned stop flag
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> RebuildSettings {
        self.settings
    }

    pub fn status(&self) -> RebuildSnapshot {
        self.snapshot_guard().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the current run to stop at the next batch boundary
    pub fn stop(&self) {
        self.stop.stop();
        log_event(
            Event::StopRequested,
            &[("running", if self.is_running() { "true" } else { "false" })],
        );
    }

    /// Clears and rebuilds `names`, blocking until the run ends
    pub fn run_selected(
        &self,
        names: &[IndexName],
        concurrency: Option<usize>,
    ) -> RebuildResult<RunReport> {
        let run = self.prepare_selected(names, concurrency)?;
        Ok(self.drive(run))
    }

    /// Same as `run_selected` but returns the run id as soon as every lease
    /// is held. Poll `status()` for progress and `wait()` for the report.
    pub fn start_selected(
        self: &Arc<Self>,
        names: &[IndexName],
        concurrency: Option<usize>,
    ) -> RebuildResult<Uuid> {
        let run = self.prepare_selected(names, concurrency)?;
        let run_id = self.snapshot_guard().run_id.unwrap_or_else(Uuid::nil);
        let this = Arc::clone(self);
        let handle = std::thread::spawn(move || this.drive(run));
        let previous = self
            .background
            .lock()
            .map_err(|_| RebuildError::LockPoisoned)?
            .replace(handle);
        // The earlier run has released its guard, so this join is brief
        if let Some(previous) = previous {
            settle_unclaimed(previous);
        }
        Ok(run_id)
    }

    /// Joins the last background run, if any
    pub fn wait(&self) -> RebuildResult<Option<RunReport>> {
        let handle = self
            .background
            .lock()
            .map_err(|_| RebuildError::LockPoisoned)?
            .take();
        match handle {
            Some(handle) => handle.join().map(Some).map_err(|_| RebuildError::RunPanicked),
            None => Ok(None),
        }
    }

    /// Re-runs every failed or never-started stage of the last run. Done
    /// stages are left alone.
    pub fn retry_failed(&self, concurrency: Option<usize>) -> RebuildResult<RunReport> {
        let concurrency = self.concurrency(concurrency)?;
        let guard = self.begin()?;
        let names: Vec<IndexName> = self
            .snapshot_guard()
            .stages
            .iter()
            .filter(|(_, s)| matches!(s.status, StageStatus::Failed | StageStatus::Pending))
            .map(|(n, _)| *n)
            .collect();
        if names.is_empty() {
            return Err(RebuildError::NothingToRetry);
        }
        let leases = self.acquire(&names)?;
        self.reset_stages(&names)?;
        self.stop.reset();
        Ok(self.drive(PreparedRun {
            _guard: guard,
            leases,
            concurrency,
        }))
    }

    /// Re-runs one failed stage without touching its siblings
    pub fn retry_one(&self, name: IndexName) -> RebuildResult<RunReport> {
        let guard = self.begin()?;
        let status = self
            .snapshot_guard()
            .stages
            .get(&name)
            .map(|s| s.status)
            .ok_or(RebuildError::NoSuchStage(name))?;
        if status == StageStatus::Done {
            return Err(RebuildError::InvalidTransition {
                index: name,
                from: status,
                to: StageStatus::Pending,
            });
        }
        let leases = self.acquire(&[name])?;
        self.reset_stages(&[name])?;
        self.stop.reset();
        Ok(self.drive(PreparedRun {
            _guard: guard,
            leases,
            concurrency: 1,
        }))
    }

    /// Empties one index outside of any run
    pub fn clear_index(&self, name: IndexName) -> RebuildResult<usize> {
        let lease = self.indexes.get(name)?.lease()?;
        StageRunner::new(&lease, self.store.as_ref(), self.sizes(), &self.metrics).clear_all()
    }

    /// Indexes the next batch of records after `cursor` outside of any run.
    /// The caller is responsible for having cleared the index first.
    pub fn rebuild_index_batch(
        &self,
        name: IndexName,
        cursor: Option<&str>,
    ) -> RebuildResult<RebuildBatch> {
        let cursor = ScanCursor::decode_opt(cursor)?;
        let lease = self.indexes.get(name)?.lease()?;
        StageRunner::new(&lease, self.store.as_ref(), self.sizes(), &self.metrics)
            .rebuild_batch(cursor)
    }

    fn sizes(&self) -> BatchSizes {
        BatchSizes {
            clear: self.settings.clear_batch_size,
            rebuild: self.settings.rebuild_batch_size,
        }
    }

    fn concurrency(&self, requested: Option<usize>) -> RebuildResult<usize> {
        match requested.unwrap_or(self.settings.default_concurrency) {
            0 => Err(RebuildError::InvalidConcurrency(0)),
            n => Ok(n),
        }
    }

    fn snapshot_guard(&self) -> MutexGuard<'_, RebuildSnapshot> {
        // Stage threads only ever replace whole stages, so a poisoned
        // snapshot is still consistent
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> RebuildResult<RunGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let run_id = self.snapshot_guard().run_id.unwrap_or_else(Uuid::nil);
            return Err(RebuildError::RunInProgress(run_id));
        }
        Ok(RunGuard(Arc::clone(&self.running)))
    }

    /// All or nothing: if any index is busy the run is refused and the
    /// leases already taken are released.
    fn acquire(&self, names: &[IndexName]) -> RebuildResult<Vec<RebuildLease>> {
        let mut leases = Vec::with_capacity(names.len());
        for name in names {
            let lease = self.indexes.get(*name).and_then(|slot| slot.lease());
            match lease {
                Ok(lease) => leases.push(lease),
                Err(e) => {
                    log_event(
                        Event::RebuildRunRefused,
                        &[("index", name.as_str()), ("reason", &e.to_string())],
                    );
                    return Err(e.into());
                }
            }
        }
        Ok(leases)
    }

    fn prepare_selected(
        &self,
        names: &[IndexName],
        concurrency: Option<usize>,
    ) -> RebuildResult<PreparedRun> {
        let concurrency = self.concurrency(concurrency)?;
        let mut unique: Vec<IndexName> = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(name) {
                unique.push(*name);
            }
        }
        if unique.is_empty() {
            return Err(RebuildError::EmptySelection);
        }

        let guard = self.begin()?;
        let leases = self.acquire(&unique)?;
        let snapshot = RebuildSnapshot::new_run(&unique);
        {
            let mut current = self.snapshot_guard();
            *current = snapshot;
            self.state.save(&current)?;
        }
        self.stop.reset();
        Ok(PreparedRun {
            _guard: guard,
            leases,
            concurrency,
        })
    }

    fn reset_stages(&self, names: &[IndexName]) -> RebuildResult<()> {
        let mut snapshot = self.snapshot_guard();
        for name in names {
            let stage = snapshot
                .stages
                .get_mut(name)
                .ok_or(RebuildError::NoSuchStage(*name))?;
            if stage.status == StageStatus::Failed {
                let reason = stage.error.clone().unwrap_or_default();
                stage.transition(*name, StageStatus::Pending)?;
                log_event(
                    Event::StageRetried,
                    &[("index", name.as_str()), ("previous_error", &reason)],
                );
            }
        }
        snapshot.updated_at = Some(Utc::now());
        self.state.save(&snapshot)
    }

    fn drive(&self, run: PreparedRun) -> RunReport {
        let run_id = self
            .snapshot_guard()
            .run_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let scope = ObservationScope::with_fields(
            "REBUILD_RUN",
            &[
                ("concurrency", &run.concurrency.to_string()),
                ("run_id", &run_id),
                ("stages", &run.leases.len().to_string()),
            ],
        );

        for (chunk_no, chunk) in run.leases.chunks(run.concurrency).enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            std::thread::scope(|s| {
                for lease in chunk {
                    s.spawn(move || self.drive_stage(lease));
                }
            });
            {
                let snapshot = self.snapshot_guard();
                self.save(&snapshot);
            }
            log_event(
                Event::RebuildChunkComplete,
                &[("chunk", &chunk_no.to_string()), ("run_id", &run_id)],
            );
        }

        let report = self.report(self.stop.is_stopped());
        scope.complete_with_fields(&[
            ("done", &report.done.to_string()),
            ("failed", &report.failed.to_string()),
            ("pending", &report.pending.to_string()),
            ("stopped", if report.stopped { "true" } else { "false" }),
        ]);
        report
    }

    fn drive_stage(&self, lease: &RebuildLease) {
        let name = lease.slot().name();
        let runner = StageRunner::new(lease, self.store.as_ref(), self.sizes(), &self.metrics);
        let mut stage = self
            .snapshot_guard()
            .stages
            .get(&name)
            .cloned()
            .unwrap_or_default();

        loop {
            let before = stage.status;
            if self.stop.is_stopped() {
                // Unstarted stages stay pending for a later retry
                if before.is_active() && stage.fail(name, STOPPED_BY_OPERATOR).is_ok() {
                    self.on_transition(name, before, &stage);
                }
                self.publish(name, &stage);
                return;
            }
            let outcome = runner.step(&mut stage);
            if stage.status != before {
                self.on_transition(name, before, &stage);
            }
            self.publish(name, &stage);
            if outcome == StepOutcome::Finished {
                return;
            }
        }
    }

    fn on_transition(&self, name: IndexName, from: StageStatus, stage: &RebuildStage) {
        log_event(
            Event::StageTransition,
            &[
                ("from", from.as_str()),
                ("index", name.as_str()),
                ("processed", &stage.processed.to_string()),
                ("to", stage.status.as_str()),
            ],
        );
        match stage.status {
            StageStatus::Done => self.metrics.increment_stages_done(),
            StageStatus::Failed => {
                self.metrics.increment_stages_failed();
                log_event(
                    Event::StageFailed,
                    &[
                        ("error", stage.error.as_deref().unwrap_or("")),
                        ("index", name.as_str()),
                        ("processed", &stage.processed.to_string()),
                    ],
                );
            }
            _ => {}
        }
    }

    fn publish(&self, name: IndexName, stage: &RebuildStage) {
        let mut snapshot = self.snapshot_guard();
        snapshot.stages.insert(name, stage.clone());
        snapshot.updated_at = Some(Utc::now());
        self.save(&snapshot);
    }

    /// Persist failures are logged, never propagated: losing a progress
    /// update must not fail the stage it describes.
    fn save(&self, snapshot: &RebuildSnapshot) {
        if let Err(e) = self.state.save(snapshot) {
            log_event(
                Event::StatePersistFailed,
                &[("code", e.code()), ("error", &e.to_string())],
            );
        }
    }

    fn report(&self, stopped: bool) -> RunReport {
        let snapshot = self.snapshot_guard().clone();
        RunReport {
            run_id: snapshot.run_id,
            done: snapshot.count(StageStatus::Done),
            failed: snapshot.count(StageStatus::Failed),
            pending: snapshot.count(StageStatus::Pending),
            stopped,
            stages: snapshot.stages,
        }
    }
}

/// Joins a background run nobody waited for and logs how it ended
fn settle_unclaimed(handle: JoinHandle<RunReport>) -> Option<RunReport> {
    match handle.join() {
        Ok(report) => {
            let run_id = report.run_id.map(|id| id.to_string()).unwrap_or_default();
            log_event(
                Event::RunReportUnclaimed,
                &[
                    ("done", &report.done.to_string()),
                    ("failed", &report.failed.to_string()),
                    ("run_id", &run_id),
                    ("stopped", if report.stopped { "true" } else { "false" }),
                ],
            );
            Some(report)
        }
        Err(_) => {
            log_event(Event::RunReportUnclaimed, &[("panicked", "true")]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::rebuild::persist::MemoryStateStore;
    use crate::record::{Galaxy, GalaxyTable, MemoryRecordStore};

    struct Fixture {
        table: GalaxyTable,
        metrics: Arc<MetricsRegistry>,
    }

    fn fixture(n: usize) -> Fixture {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let indexes = Arc::new(IndexRegistry::all());
        let metrics = Arc::new(MetricsRegistry::new());
        let table = GalaxyTable::new(store, indexes, metrics.clone());
        for i in 0..n {
            let mut g = Galaxy::new(format!("g{:04}", i));
            g.ra = (i * 7 % 360) as f64;
            g.dec = i as f64 / 10.0 - 30.0;
            g.nucleus = i % 3 == 0;
            table.insert(g).unwrap();
        }
        Fixture { table, metrics }
    }

    fn settings() -> RebuildSettings {
        RebuildSettings {
            clear_batch_size: 16,
            rebuild_batch_size: 10,
            default_concurrency: 2,
        }
    }

    fn coordinator(fx: &Fixture, state: Arc<dyn RebuildStateStore>) -> RebuildCoordinator {
        RebuildCoordinator::open(
            fx.table.store().clone(),
            fx.table.indexes().clone(),
            state,
            fx.metrics.clone(),
            settings(),
        )
        .unwrap()
    }

    /// Raises the stop flag on the n-th save
    struct StopOnSave {
        inner: MemoryStateStore,
        saves: AtomicUsize,
        at: usize,
        stop: StopSignal,
    }

    impl RebuildStateStore for StopOnSave {
        fn load(&self) -> RebuildResult<Option<RebuildSnapshot>> {
            self.inner.load()
        }

        fn save(&self, snapshot: &RebuildSnapshot) -> RebuildResult<()> {
            if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
                self.stop.stop();
            }
            self.inner.save(snapshot)
        }
    }

    #[test]
    fn test_run_all_indexes() {
        let fx = fixture(45);
        let coord = coordinator(&fx, Arc::new(MemoryStateStore::new()));
        let report = coord.run_selected(&IndexName::ALL, Some(4)).unwrap();
        assert_eq!(report.done, IndexName::ALL.len());
        assert_eq!(report.failed, 0);
        assert!(!report.stopped);
        for (name, summary) in fx.table.indexes().summaries().unwrap() {
            assert_eq!(summary.count, 45, "{}", name);
            assert_eq!(report.stages[&name].processed, 45);
        }
        assert!(!coord.is_running());
        assert_eq!(fx.metrics.snapshot().stages_done, IndexName::ALL.len() as u64);
    }

    #[test]
    fn test_invalid_requests() {
        let fx = fixture(3);
        let coord = coordinator(&fx, Arc::new(MemoryStateStore::new()));
        assert!(matches!(
            coord.run_selected(&[IndexName::Ra], Some(0)),
            Err(RebuildError::InvalidConcurrency(0))
        ));
        assert!(matches!(
            coord.run_selected(&[], None),
            Err(RebuildError::EmptySelection)
        ));
        assert!(matches!(coord.retry_failed(None), Err(RebuildError::NothingToRetry)));
        assert!(matches!(
            coord.retry_one(IndexName::Ra),
            Err(RebuildError::NoSuchStage(IndexName::Ra))
        ));
    }

    #[test]
    fn test_busy_index_refuses_whole_run() {
        let fx = fixture(5);
        let coord = coordinator(&fx, Arc::new(MemoryStateStore::new()));
        let _held = fx.table.indexes().get(IndexName::Dec).unwrap().lease().unwrap();

        let err = coord
            .run_selected(&[IndexName::Ra, IndexName::Dec], None)
            .unwrap_err();
        assert_eq!(err.code(), "GALAXY_INDEX_BUSY");
        assert!(coord.status().stages.is_empty());
        // Ra's lease was released with the refusal
        assert!(!fx.table.indexes().get(IndexName::Ra).unwrap().is_rebuilding());
        assert!(coord.clear_index(IndexName::Dec).is_err());
        assert!(!coord.is_running());
    }

    #[test]
    fn test_stop_then_retry_failed() {
        let fx = fixture(30);
        let stop = StopSignal::new();
        let state = Arc::new(StopOnSave {
            inner: MemoryStateStore::new(),
            saves: AtomicUsize::new(0),
            at: 2,
            stop: stop.clone(),
        });
        let coord = coordinator(&fx, state).with_stop_signal(stop);

        let report = coord
            .run_selected(&[IndexName::Ra, IndexName::Dec], Some(1))
            .unwrap();
        assert!(report.stopped);
        let ra = &report.stages[&IndexName::Ra];
        assert_eq!(ra.status, StageStatus::Failed);
        assert_eq!(ra.error.as_deref(), Some(STOPPED_BY_OPERATOR));
        assert_eq!(report.stages[&IndexName::Dec].status, StageStatus::Pending);

        let report = coord.retry_failed(None).unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(fx.table.indexes().summary(IndexName::Ra).unwrap().count, 30);
        assert_eq!(fx.table.indexes().summary(IndexName::Dec).unwrap().count, 30);
    }

    #[test]
    fn test_retry_one_leaves_done_siblings() {
        let fx = fixture(12);
        let coord = coordinator(&fx, Arc::new(MemoryStateStore::new()));
        coord.run_selected(&[IndexName::Ra, IndexName::Mag], None).unwrap();
        let mag_done_at = coord.status().stages[&IndexName::Mag].completed_at;

        assert!(matches!(
            coord.retry_one(IndexName::Ra),
            Err(RebuildError::InvalidTransition { .. })
        ));

        {
            let mut snapshot = coord.snapshot_guard();
            let ra = snapshot.stages.get_mut(&IndexName::Ra).unwrap();
            *ra = RebuildStage::new();
            ra.transition(IndexName::Ra, StageStatus::Clearing).unwrap();
            ra.fail(IndexName::Ra, "boom").unwrap();
        }
        let report = coord.retry_one(IndexName::Ra).unwrap();
        assert_eq!(report.stages[&IndexName::Ra].status, StageStatus::Done);
        assert_eq!(report.stages[&IndexName::Mag].completed_at, mag_done_at);
    }

    #[test]
    fn test_background_run() {
        let fx = fixture(20);
        let coord = Arc::new(coordinator(&fx, Arc::new(MemoryStateStore::new())));
        let run_id = coord.start_selected(&[IndexName::Q], None).unwrap();
        let report = coord.wait().unwrap().unwrap();
        assert_eq!(report.run_id, Some(run_id));
        assert_eq!(report.done, 1);
        assert!(coord.wait().unwrap().is_none());
    }

    #[test]
    fn test_unwaited_run_is_settled_by_the_next() {
        let fx = fixture(20);
        let coord = Arc::new(coordinator(&fx, Arc::new(MemoryStateStore::new())));
        coord.start_selected(&[IndexName::Q], None).unwrap();
        while coord.is_running() {
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let second = coord.start_selected(&[IndexName::Pa], None).unwrap();
        let report = coord.wait().unwrap().unwrap();
        assert_eq!(report.run_id, Some(second));
        assert_eq!(report.stages[&IndexName::Pa].status, StageStatus::Done);
        assert!(coord.wait().unwrap().is_none());
    }

    #[test]
    fn test_settle_unclaimed_returns_report() {
        let report = RunReport {
            run_id: Some(Uuid::new_v4()),
            stages: BTreeMap::new(),
            done: 2,
            failed: 1,
            pending: 0,
            stopped: false,
        };
        let expected = report.run_id;
        let settled = settle_unclaimed(std::thread::spawn(move || report)).unwrap();
        assert_eq!(settled.run_id, expected);
        assert_eq!(settled.failed, 1);

        let panicked = std::thread::spawn(|| -> RunReport { panic!("run aborted") });
        assert!(settle_unclaimed(panicked).is_none());
    }

    #[test]
    fn test_single_stage_batches() {
        let fx = fixture(25);
        let coord = coordinator(&fx, Arc::new(MemoryStateStore::new()));
        assert_eq!(coord.clear_index(IndexName::Pa).unwrap(), 25);

        let mut cursor: Option<String> = None;
        let mut calls = 0;
        loop {
            let batch = coord
                .rebuild_index_batch(IndexName::Pa, cursor.as_deref())
                .unwrap();
            calls += 1;
            cursor = batch.continue_cursor;
            if batch.is_done {
                break;
            }
        }
        assert_eq!(calls, 3);
        assert_eq!(fx.table.indexes().summary(IndexName::Pa).unwrap().count, 25);
        assert_eq!(
            coord.rebuild_index_batch(IndexName::Pa, Some("%%")).unwrap_err().code(),
            "GALAXY_CURSOR_INVALID"
        );
    }
}
