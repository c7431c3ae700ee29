//! API request parsing
//!
//! One JSON object per request. `op` selects the operation; the remaining
//! fields are that operation's arguments in camelCase.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::errors::{ApiError, ApiResult};
use crate::index::IndexName;
use crate::query::{BrowseRequest, FilterSet, SortOrder};
use crate::record::{Field, Galaxy, RecordId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexArgs {
    pub index: IndexName,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetCursorArgs {
    pub sort: Field,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub filters: FilterSet,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBatchArgs {
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountApproximateArgs {
    pub index: IndexName,
    #[serde(default)]
    pub filters: FilterSet,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountExactArgs {
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildBatchArgs {
    pub index: IndexName,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_wait() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRebuildArgs {
    /// Every registered index when absent
    #[serde(default)]
    pub indexes: Option<Vec<IndexName>>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Block until the run ends; otherwise return the run id at once
    #[serde(default = "default_wait")]
    pub wait: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryFailedArgs {
    #[serde(default)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillArgs {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertArgs {
    pub galaxy: Galaxy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteArgs {
    pub record_id: RecordId,
}

/// Parsed request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Browse(BrowseRequest),
    OffsetCursor(OffsetCursorArgs),
    CountBatch(CountBatchArgs),
    CountApproximate(CountApproximateArgs),
    CountExact(CountExactArgs),
    IndexSummary(IndexArgs),
    Summaries,
    ClearIndex(IndexArgs),
    RebuildIndexBatch(RebuildBatchArgs),
    RunRebuild(RunRebuildArgs),
    RebuildStatus,
    RetryStage(IndexArgs),
    RetryFailed(RetryFailedArgs),
    StopRebuild,
    StaleHint,
    BackfillBatch(BackfillArgs),
    InsertGalaxy(InsertArgs),
    DeleteGalaxy(DeleteArgs),
    Metrics,
}

fn args<T: DeserializeOwned>(op: &str, value: Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::invalid_request(format!("{}: {}", op, e)))
}

impl Request {
    pub fn parse(json: &str) -> ApiResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ApiError::invalid_request(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> ApiResult<Self> {
        let op = value
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_request("missing op"))?
            .to_string();

        let request = match op.as_str() {
            "browse" => Request::Browse(args(&op, value)?),
            "offsetCursor" => Request::OffsetCursor(args(&op, value)?),
            "countBatch" => Request::CountBatch(args(&op, value)?),
            "countApproximate" => Request::CountApproximate(args(&op, value)?),
            "countExact" => Request::CountExact(args(&op, value)?),
            "indexSummary" => Request::IndexSummary(args(&op, value)?),
            "summaries" => Request::Summaries,
            "clearIndex" => Request::ClearIndex(args(&op, value)?),
            "rebuildIndexBatch" => Request::RebuildIndexBatch(args(&op, value)?),
            "runRebuild" => Request::RunRebuild(args(&op, value)?),
            "rebuildStatus" => Request::RebuildStatus,
            "retryStage" => Request::RetryStage(args(&op, value)?),
            "retryFailed" => Request::RetryFailed(args(&op, value)?),
            "stopRebuild" => Request::StopRebuild,
            "staleHint" => Request::StaleHint,
            "backfillBatch" => Request::BackfillBatch(args(&op, value)?),
            "insertGalaxy" => Request::InsertGalaxy(args(&op, value)?),
            "deleteGalaxy" => Request::DeleteGalaxy(args(&op, value)?),
            "metrics" => Request::Metrics,
            other => return Err(ApiError::unknown_operation(other)),
        };
        Ok(request)
    }

    /// Whether the request changes stored records
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::InsertGalaxy(_) | Request::DeleteGalaxy(_) | Request::BackfillBatch(_)
        )
    }
}
