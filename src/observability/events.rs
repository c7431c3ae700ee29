//! Lifecycle events
//!
//! Every event name that the crate logs lives here so that log consumers
//! have one place to look.

use std::fmt;

/// Events emitted by the index maintenance and query paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Process
    ConfigLoaded,
    DatasetLoaded,
    ServeStart,
    ServeStop,

    // Write path
    RecordInserted,
    RecordDeleted,

    // Rebuild
    RebuildRunRefused,
    RebuildChunkComplete,
    StageTransition,
    StageFailed,
    StageRetried,
    StopRequested,
    ClearComplete,
    RebuildBatch,
    DuplicateKey,
    RollbackFailed,
    RunReportUnclaimed,
    StateRestored,
    StatePersistFailed,

    // Query
    BrowseServed,
    BrowseFallbackScan,
    CursorRejected,

    // Count
    CountBatch,
    CountComplete,
    CountInterrupted,

    // Backfill
    BackfillBatch,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DatasetLoaded => "DATASET_LOADED",
            Event::ServeStart => "SERVE_START",
            Event::ServeStop => "SERVE_STOP",

            Event::RecordInserted => "RECORD_INSERTED",
            Event::RecordDeleted => "RECORD_DELETED",

            Event::RebuildRunRefused => "REBUILD_RUN_REFUSED",
            Event::RebuildChunkComplete => "REBUILD_CHUNK_COMPLETE",
            Event::StageTransition => "STAGE_TRANSITION",
            Event::StageFailed => "STAGE_FAILED",
            Event::StageRetried => "STAGE_RETRIED",
            Event::StopRequested => "REBUILD_STOP_REQUESTED",
            Event::ClearComplete => "INDEX_CLEAR_COMPLETE",
            Event::RebuildBatch => "INDEX_REBUILD_BATCH",
            Event::DuplicateKey => "INDEX_DUPLICATE_KEY",
            Event::RollbackFailed => "INDEX_ROLLBACK_FAILED",
            Event::RunReportUnclaimed => "REBUILD_REPORT_UNCLAIMED",
            Event::StateRestored => "REBUILD_STATE_RESTORED",
            Event::StatePersistFailed => "REBUILD_STATE_PERSIST_FAILED",

            Event::BrowseServed => "BROWSE_SERVED",
            Event::BrowseFallbackScan => "BROWSE_FALLBACK_SCAN",
            Event::CursorRejected => "CURSOR_REJECTED",

            Event::CountBatch => "COUNT_BATCH",
            Event::CountComplete => "COUNT_COMPLETE",
            Event::CountInterrupted => "COUNT_INTERRUPTED",

            Event::BackfillBatch => "BACKFILL_BATCH",
        }
    }

    /// Severity an event is logged at unless the caller overrides it
    pub fn default_severity(&self) -> super::Severity {
        use super::Severity;
        match self {
            Event::RecordInserted
            | Event::RecordDeleted
            | Event::RebuildBatch
            | Event::CountBatch
            | Event::BrowseServed => Severity::Trace,
            Event::StageFailed
            | Event::DuplicateKey
            | Event::RollbackFailed
            | Event::StatePersistFailed => Severity::Error,
            Event::RebuildRunRefused
            | Event::CursorRejected
            | Event::CountInterrupted
            | Event::RunReportUnclaimed
            | Event::StateRestored => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
