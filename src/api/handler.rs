//! Request dispatch
//!
//! Flow for every request:
//! 1. Parse JSON and `op`
//! 2. Dispatch to the owning subsystem
//! 3. Serialize the result into the response envelope
//!
//! Subsystems synchronize internally, so the handler takes `&self` and may
//! be shared across threads.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::errors::{ApiError, ApiResult};
use super::request::Request;
use super::response::Response;
use crate::backfill::NumericIdBackfill;
use crate::config::Config;
use crate::count::{CountEstimator, ExactCountScan};
use crate::index::IndexRegistry;
use crate::observability::MetricsRegistry;
use crate::query::BrowseEngine;
use crate::rebuild::{stale_index_hint, RebuildCoordinator, RebuildStateStore};
use crate::record::{GalaxyTable, RecordStore};

/// Everything a request can reach
pub struct Subsystems {
    pub table: Arc<GalaxyTable>,
    pub browse: BrowseEngine,
    pub count: CountEstimator,
    pub coordinator: Arc<RebuildCoordinator>,
    pub metrics: Arc<MetricsRegistry>,
    pub backfill_batch_size: usize,
}

impl Subsystems {
    /// Wires every subsystem around one store and one index registry
    pub fn assemble(
        config: &Config,
        store: Arc<dyn RecordStore>,
        state: Arc<dyn RebuildStateStore>,
    ) -> ApiResult<Self> {
        let indexes = Arc::new(IndexRegistry::with_indexes(&config.index_names()));
        let metrics = Arc::new(MetricsRegistry::new());
        let table = Arc::new(GalaxyTable::new(
            Arc::clone(&store),
            Arc::clone(&indexes),
            Arc::clone(&metrics),
        ));
        let browse = BrowseEngine::new(
            Arc::clone(&store),
            Arc::clone(&indexes),
            Arc::clone(&metrics),
            config.page_limits(),
        );
        let count = CountEstimator::new(
            Arc::clone(&store),
            Arc::clone(&indexes),
            Arc::clone(&metrics),
            config.count_limits(),
        );
        let coordinator = Arc::new(RebuildCoordinator::open(
            store,
            indexes,
            state,
            Arc::clone(&metrics),
            config.rebuild_settings(),
        )?);
        Ok(Self {
            table,
            browse,
            count,
            coordinator,
            metrics,
            backfill_batch_size: config.backfill_batch_size,
        })
    }
}

fn to_data<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

pub struct ApiHandler {
    subsystems: Subsystems,
}

impl ApiHandler {
    pub fn new(subsystems: Subsystems) -> Self {
        Self { subsystems }
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    /// Handles one raw JSON request. Never fails: errors become error
    /// responses.
    pub fn handle(&self, json: &str) -> Response {
        match Request::parse(json) {
            Ok(req) => self.respond(req),
            Err(e) => Response::error(&e),
        }
    }

    /// Dispatches an already parsed request
    pub fn respond(&self, request: Request) -> Response {
        match self.dispatch(request) {
            Ok(data) => Response::success(data),
            Err(e) => Response::error(&e),
        }
    }

    pub fn dispatch(&self, request: Request) -> ApiResult<Value> {
        let s = &self.subsystems;
        match request {
            Request::Browse(req) => to_data(&s.browse.browse(&req)?),
            Request::OffsetCursor(args) => {
                let cursor =
                    s.browse
                        .cursor_at_offset(args.sort, args.order, &args.filters, args.offset)?;
                Ok(json!({ "cursor": cursor }))
            }
            Request::CountBatch(args) => to_data(&s.count.count_batch(
                &args.filters,
                args.cursor.as_deref(),
                args.batch_size,
            )?),
            Request::CountApproximate(args) => {
                to_data(&s.count.approximate(args.index, &args.filters)?)
            }
            Request::CountExact(args) => {
                let mut scan = ExactCountScan::new(&s.count, args.filters);
                if let Some(size) = args.batch_size {
                    scan = scan.with_batch_size(size);
                }
                to_data(&scan.run()?)
            }
            Request::IndexSummary(args) => to_data(&s.table.indexes().summary(args.index)?),
            Request::Summaries => to_data(&s.table.indexes().summaries()?),
            Request::ClearIndex(args) => {
                let cleared = s.coordinator.clear_index(args.index)?;
                Ok(json!({ "index": args.index, "cleared": cleared }))
            }
            Request::RebuildIndexBatch(args) => {
                to_data(&s.coordinator.rebuild_index_batch(args.index, args.cursor.as_deref())?)
            }
            Request::RunRebuild(args) => {
                let names = args.indexes.unwrap_or_else(|| s.table.indexes().names());
                if args.wait {
                    to_data(&s.coordinator.run_selected(&names, args.concurrency)?)
                } else {
                    let run_id = s.coordinator.start_selected(&names, args.concurrency)?;
                    Ok(json!({ "runId": run_id, "started": true }))
                }
            }
            Request::RebuildStatus => {
                let mut status = to_data(&s.coordinator.status())?;
                if let Value::Object(map) = &mut status {
                    map.insert("running".to_string(), json!(s.coordinator.is_running()));
                }
                Ok(status)
            }
            Request::RetryStage(args) => to_data(&s.coordinator.retry_one(args.index)?),
            Request::RetryFailed(args) => to_data(&s.coordinator.retry_failed(args.concurrency)?),
            Request::StopRebuild => {
                s.coordinator.stop();
                Ok(json!({ "stopRequested": true }))
            }
            Request::StaleHint => {
                let summaries = s.table.indexes().summaries()?;
                to_data(&stale_index_hint(&summaries, &s.coordinator.status()))
            }
            Request::BackfillBatch(args) => {
                let size = args.batch_size.unwrap_or(s.backfill_batch_size);
                to_data(&NumericIdBackfill::new(&s.table, size)?.run_batch(args.cursor.as_deref())?)
            }
            Request::InsertGalaxy(args) => {
                let id = s.table.insert(args.galaxy)?;
                Ok(json!({ "recordId": id }))
            }
            Request::DeleteGalaxy(args) => {
                let galaxy = s.table.delete(args.record_id)?;
                Ok(json!({ "recordId": args.record_id, "id": galaxy.id }))
            }
            Request::Metrics => to_data(&s.metrics.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebuild::MemoryStateStore;
    use crate::record::{Galaxy, MemoryRecordStore};

    fn handler(n: usize) -> ApiHandler {
        let config = Config::new("unused");
        let subsystems = Subsystems::assemble(
            &config,
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryStateStore::new()),
        )
        .unwrap();
        for i in 0..n {
            let mut g = Galaxy::new(format!("g{:03}", i));
            g.ra = i as f64;
            g.nucleus = i % 2 == 0;
            subsystems.table.insert(g).unwrap();
        }
        ApiHandler::new(subsystems)
    }

    fn ok(handler: &ApiHandler, json: &str) -> Value {
        let resp = handler.handle(json);
        assert!(resp.is_success(), "{} -> {}", json, resp.to_json());
        resp.data().cloned().unwrap_or(Value::Null)
    }

    #[test]
    fn test_browse_and_summary() {
        let h = handler(12);
        let page = ok(&h, r#"{"op":"browse","sort":"ra","order":"desc","pageSize":5}"#);
        assert_eq!(page["records"].as_array().unwrap().len(), 5);
        assert_eq!(page["records"][0]["ra"], json!(11.0));
        assert_eq!(page["hasNext"], json!(true));

        let summary = ok(&h, r#"{"op":"indexSummary","index":"nucleus"}"#);
        assert_eq!(summary["trueCount"], json!(6));
        assert_eq!(summary["falseCount"], json!(6));
    }

    #[test]
    fn test_rebuild_ops() {
        let h = handler(7);
        let cleared = ok(&h, r#"{"op":"clearIndex","index":"ra"}"#);
        assert_eq!(cleared["cleared"], json!(7));
        let batch = ok(&h, r#"{"op":"rebuildIndexBatch","index":"ra"}"#);
        assert_eq!(batch["processed"], json!(7));
        assert_eq!(batch["isDone"], json!(true));

        let report = ok(&h, r#"{"op":"runRebuild","indexes":["ra","dec"],"concurrency":2}"#);
        assert_eq!(report["done"], json!(2));
        let status = ok(&h, r#"{"op":"rebuildStatus"}"#);
        assert_eq!(status["running"], json!(false));
        assert_eq!(status["stages"]["dec"]["status"], json!("done"));

        let hint = ok(&h, r#"{"op":"staleHint"}"#);
        assert_eq!(hint["majorityCount"], json!(7));
    }

    #[test]
    fn test_errors_keep_subsystem_codes() {
        let h = handler(3);
        let resp = h.handle(r#"{"op":"browse","pageSize":0}"#);
        assert_eq!(resp.error_code(), Some("GALAXY_PAGE_SIZE_INVALID"));
        let resp = h.handle(r#"{"op":"browse","cursor":"not-a-cursor"}"#);
        assert_eq!(resp.error_code(), Some("GALAXY_CURSOR_INVALID"));
        let resp = h.handle(r#"{"op":"retryFailed"}"#);
        assert_eq!(resp.error_code(), Some("GALAXY_NOTHING_TO_RETRY"));
        let resp = h.handle("{not json");
        assert_eq!(resp.error_code(), Some("GALAXY_INVALID_REQUEST"));
    }

    #[test]
    fn test_writes_and_counts() {
        let h = handler(4);
        let inserted = ok(&h, r#"{"op":"insertGalaxy","galaxy":{"id":"new","ra":99.5,"dec":1,"reff":2,"q":0.5,"pa":10,"nucleus":false}}"#);
        assert_eq!(inserted["recordId"], json!(5));
        ok(&h, r#"{"op":"deleteGalaxy","recordId":1}"#);

        let exact = ok(&h, r#"{"op":"countExact","batchSize":2}"#);
        assert_eq!(exact["outcome"], json!("complete"));
        assert_eq!(exact["total"], json!(4));
        let approx = ok(&h, r#"{"op":"countApproximate","index":"ra"}"#);
        assert_eq!(approx["count"], json!(4));

        let metrics = ok(&h, r#"{"op":"metrics"}"#);
        assert_eq!(metrics["records_written"], json!(6));
    }
}
