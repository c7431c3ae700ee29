//! Rebuild stage state machine
//!
//! ```text
//! pending -> clearing -> rebuilding -> done
//!               |            |
//!               +--> failed <+
//!                      |
//!                      +--> pending   (explicit retry)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{RebuildError, RebuildResult};
use crate::index::IndexName;

pub const STOPPED_BY_OPERATOR: &str = "stopped by operator";
pub const INTERRUPTED: &str = "interrupted before completion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Clearing,
    Rebuilding,
    Done,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Clearing => "clearing",
            StageStatus::Rebuilding => "rebuilding",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        }
    }

    pub fn can_move_to(&self, to: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, to),
            (Pending, Clearing)
                | (Clearing, Rebuilding)
                | (Rebuilding, Done)
                | (Clearing, Failed)
                | (Rebuilding, Failed)
                | (Failed, Pending)
        )
    }

    /// Clearing or rebuilding
    pub fn is_active(&self) -> bool {
        matches!(self, StageStatus::Clearing | StageStatus::Rebuilding)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Done | StageStatus::Failed)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one index within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildStage {
    pub status: StageStatus,
    /// Records inserted by the rebuild scan so far
    pub processed: usize,
    /// Entries removed while clearing
    #[serde(default)]
    pub cleared: usize,
    /// Scan position of the last completed batch
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Default for RebuildStage {
    fn default() -> Self {
        Self::new()
    }
}

impl RebuildStage {
    pub fn new() -> Self {
        Self {
            status: StageStatus::Pending,
            processed: 0,
            cleared: 0,
            cursor: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn transition(&mut self, index: IndexName, to: StageStatus) -> RebuildResult<()> {
        if !self.status.can_move_to(to) {
            return Err(RebuildError::InvalidTransition {
                index,
                from: self.status,
                to,
            });
        }
        match to {
            StageStatus::Pending => *self = RebuildStage::new(),
            StageStatus::Clearing => {
                self.started_at = Some(Utc::now());
                self.processed = 0;
                self.cleared = 0;
                self.cursor = None;
                self.error = None;
            }
            StageStatus::Rebuilding => {}
            StageStatus::Done | StageStatus::Failed => self.completed_at = Some(Utc::now()),
        }
        self.status = to;
        Ok(())
    }

    pub fn fail(&mut self, index: IndexName, reason: impl Into<String>) -> RebuildResult<()> {
        self.transition(index, StageStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }
}

/// Everything observers see about the current (or last) run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSnapshot {
    #[serde(default)]
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stages: BTreeMap<IndexName, RebuildStage>,
}

impl RebuildSnapshot {
    pub fn new_run(names: &[IndexName]) -> Self {
        Self {
            run_id: Some(Uuid::new_v4()),
            updated_at: Some(Utc::now()),
            stages: names.iter().map(|n| (*n, RebuildStage::new())).collect(),
        }
    }

    pub fn count(&self, status: StageStatus) -> usize {
        self.stages.values().filter(|s| s.status == status).count()
    }

    pub fn is_running(&self) -> bool {
        self.stages.values().any(|s| s.status.is_active())
    }

    /// A snapshot reloaded after a restart cannot have live stages: any stage
    /// caught mid-flight is shown as failed so it can be retried explicitly.
    /// Returns true if anything changed.
    pub fn mark_interrupted(&mut self) -> bool {
        let mut changed = false;
        for (name, stage) in self.stages.iter_mut() {
            if stage.status.is_active() && stage.fail(*name, INTERRUPTED).is_ok() {
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut stage = RebuildStage::new();
        for to in [StageStatus::Clearing, StageStatus::Rebuilding, StageStatus::Done] {
            stage.transition(IndexName::Ra, to).unwrap();
        }
        assert!(stage.started_at.is_some());
        assert!(stage.completed_at.is_some());
    }

    #[test]
    fn test_illegal_moves_rejected() {
        let mut stage = RebuildStage::new();
        assert!(stage.transition(IndexName::Ra, StageStatus::Done).is_err());
        assert!(stage.fail(IndexName::Ra, "x").is_err());
        stage.transition(IndexName::Ra, StageStatus::Clearing).unwrap();
        stage.transition(IndexName::Ra, StageStatus::Rebuilding).unwrap();
        stage.transition(IndexName::Ra, StageStatus::Done).unwrap();
        assert!(stage.transition(IndexName::Ra, StageStatus::Pending).is_err());
    }

    #[test]
    fn test_retry_resets_progress() {
        let mut stage = RebuildStage::new();
        stage.transition(IndexName::Ra, StageStatus::Clearing).unwrap();
        stage.transition(IndexName::Ra, StageStatus::Rebuilding).unwrap();
        stage.processed = 40;
        stage.fail(IndexName::Ra, "boom").unwrap();
        assert_eq!(stage.error.as_deref(), Some("boom"));
        stage.transition(IndexName::Ra, StageStatus::Pending).unwrap();
        assert_eq!(stage, RebuildStage::new());
    }

    #[test]
    fn test_mark_interrupted() {
        let mut snap = RebuildSnapshot::new_run(&[IndexName::Ra, IndexName::Dec, IndexName::Q]);
        let ra = snap.stages.get_mut(&IndexName::Ra).unwrap();
        ra.transition(IndexName::Ra, StageStatus::Clearing).unwrap();
        ra.transition(IndexName::Ra, StageStatus::Rebuilding).unwrap();
        assert!(snap.is_running());

        assert!(snap.mark_interrupted());
        assert!(!snap.is_running());
        let ra = &snap.stages[&IndexName::Ra];
        assert_eq!(ra.status, StageStatus::Failed);
        assert_eq!(ra.error.as_deref(), Some(INTERRUPTED));
        assert_eq!(snap.count(StageStatus::Pending), 2);
        assert!(!snap.mark_interrupted());
    }

    #[test]
    fn test_json_layout() {
        let snap = RebuildSnapshot::new_run(&[IndexName::MeanMue]);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["stages"]["meanMue"]["status"], "pending");
        assert_eq!(json["stages"]["meanMue"]["processed"], 0);
        assert!(json["runId"].is_string());
    }
}
