//! Stale-index hint
//!
//! Indexes that were rebuilt cleanly should all report the record count.
//! The most common count among them is taken as the truth and any index
//! disagreeing with it is flagged. This is a display hint only: a run that
//! raced with writes can make the majority itself wrong.

use std::collections::BTreeMap;

use serde::Serialize;

use super::state::{RebuildSnapshot, StageStatus};
use crate::index::{AggregateSummary, IndexName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleHint {
    /// `None` when there is nothing to vote with
    pub majority_count: Option<usize>,
    /// Indexes whose counts formed the vote
    pub basis: Vec<IndexName>,
    /// Indexes whose count differs from the majority
    pub suspect: Vec<IndexName>,
}

/// Votes among indexes whose last stage finished `done`, or among every
/// index when none has. Ties go to the larger count.
pub fn stale_index_hint(
    summaries: &BTreeMap<IndexName, AggregateSummary>,
    snapshot: &RebuildSnapshot,
) -> StaleHint {
    let done: Vec<IndexName> = summaries
        .keys()
        .filter(|name| {
            snapshot
                .stages
                .get(name)
                .map_or(false, |s| s.status == StageStatus::Done)
        })
        .copied()
        .collect();
    let basis = if done.is_empty() {
        summaries.keys().copied().collect()
    } else {
        done
    };

    let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
    for name in &basis {
        if let Some(summary) = summaries.get(name) {
            *votes.entry(summary.count).or_insert(0) += 1;
        }
    }
    // max_by_key keeps the last maximum, and BTreeMap iterates counts upward
    let majority_count = votes
        .iter()
        .max_by_key(|(_, votes)| **votes)
        .map(|(count, _)| *count);

    let suspect = match majority_count {
        Some(majority) => summaries
            .iter()
            .filter(|(_, s)| s.count != majority)
            .map(|(n, _)| *n)
            .collect(),
        None => Vec::new(),
    };

    StaleHint {
        majority_count,
        basis,
        suspect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebuild::state::RebuildStage;

    fn summary(count: usize) -> AggregateSummary {
        AggregateSummary {
            count,
            min: None,
            max: None,
            true_count: None,
            false_count: None,
        }
    }

    fn done_stage() -> RebuildStage {
        let mut stage = RebuildStage::new();
        for to in [StageStatus::Clearing, StageStatus::Rebuilding, StageStatus::Done] {
            stage.transition(IndexName::Ra, to).unwrap();
        }
        stage
    }

    #[test]
    fn test_majority_of_done_stages() {
        let summaries: BTreeMap<_, _> = [
            (IndexName::Ra, summary(100)),
            (IndexName::Dec, summary(100)),
            (IndexName::Mag, summary(95)),
            (IndexName::Q, summary(120)),
        ]
        .into_iter()
        .collect();
        let mut snapshot = RebuildSnapshot::default();
        for name in [IndexName::Ra, IndexName::Dec, IndexName::Mag] {
            snapshot.stages.insert(name, done_stage());
        }

        let hint = stale_index_hint(&summaries, &snapshot);
        assert_eq!(hint.majority_count, Some(100));
        assert_eq!(hint.basis, vec![IndexName::Ra, IndexName::Dec, IndexName::Mag]);
        assert_eq!(hint.suspect, vec![IndexName::Q, IndexName::Mag]);
    }

    #[test]
    fn test_no_done_stages_votes_across_all() {
        let summaries: BTreeMap<_, _> = [(IndexName::Ra, summary(7)), (IndexName::Dec, summary(9))]
            .into_iter()
            .collect();
        let hint = stale_index_hint(&summaries, &RebuildSnapshot::default());
        assert_eq!(hint.majority_count, Some(9));
        assert_eq!(hint.suspect, vec![IndexName::Ra]);
    }

    #[test]
    fn test_empty() {
        let hint = stale_index_hint(&BTreeMap::new(), &RebuildSnapshot::default());
        assert_eq!(hint.majority_count, None);
        assert!(hint.suspect.is_empty());
    }
}
