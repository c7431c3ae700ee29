//! CLI command implementations
//!
//! Every command that touches data boots the same way:
//! 1. Load and validate the configuration
//! 2. Load the dataset into the record store, indexing every record
//! 3. Reload the persisted rebuild state for display
//!
//! Record writes made through `serve` or `request` are written back to the
//! dataset file before the command exits.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::api::{ApiHandler, Request, Response, Subsystems};
use crate::config::Config;
use crate::index::IndexName;
use crate::observability::{log_event, Event, Logger};
use crate::rebuild::{JsonFileStateStore, RebuildStateStore};
use crate::record::{load_jsonl, save_jsonl, Galaxy, GalaxyTable, MemoryRecordStore, ScanCursor};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_lines, read_request, write_json, write_response};

/// Main CLI entry point; the only function main.rs calls
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
        Command::Request { config, json } => request(&config, json),
        Command::Rebuild {
            config,
            indexes,
            concurrency,
        } => rebuild(&config, indexes, concurrency),
        Command::Status { config } => status(&config),
        Command::Generate {
            config,
            count,
            seed,
        } => generate(&config, count, seed),
    }
}

fn load_config(path: &Path) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::set_min_severity(config.severity()?);
    log_event(
        Event::ConfigLoaded,
        &[
            ("data_dir", &config.data_dir),
            ("indexes", &config.index_names().len().to_string()),
        ],
    );
    Ok(config)
}

fn is_initialized(config: &Config) -> bool {
    config.dataset_path().exists()
}

fn require_initialized(config: &Config) -> CliResult<()> {
    if !is_initialized(config) {
        return Err(CliError::NotInitialized(config.data_path().to_path_buf()));
    }
    Ok(())
}

/// Creates the data directory and an empty dataset
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    if is_initialized(&config) {
        return Err(CliError::AlreadyInitialized(config.data_path().to_path_buf()));
    }
    fs::create_dir_all(config.data_path())?;
    save_jsonl(&config.dataset_path(), std::iter::empty::<&Galaxy>())?;
    write_response(json!({ "initialized": true, "dataDir": config.data_dir }))
}

/// Loads the dataset and wires every subsystem
pub fn boot(config: &Config) -> CliResult<ApiHandler> {
    require_initialized(config)?;
    let state: Arc<dyn RebuildStateStore> =
        Arc::new(JsonFileStateStore::new(config.rebuild_state_path()));
    let subsystems = Subsystems::assemble(config, Arc::new(MemoryRecordStore::new()), state)?;

    let galaxies = load_jsonl(&config.dataset_path())?;
    let loaded = galaxies.len();
    for galaxy in galaxies {
        subsystems.table.import(galaxy)?;
    }
    log_event(
        Event::DatasetLoaded,
        &[
            ("path", &config.dataset_path().display().to_string()),
            ("records", &loaded.to_string()),
        ],
    );
    Ok(ApiHandler::new(subsystems))
}

/// Writes every stored galaxy back to the dataset file, in record order
pub fn persist_dataset(config: &Config, table: &GalaxyTable) -> CliResult<usize> {
    let mut galaxies = Vec::new();
    let mut cursor: Option<ScanCursor> = None;
    loop {
        let page = table.store().scan(cursor, 1_000)?;
        galaxies.extend(page.records.into_iter().map(|(_, g)| g));
        if page.is_done {
            break;
        }
        cursor = page.continue_cursor;
    }
    Ok(save_jsonl(&config.dataset_path(), &galaxies)?)
}

/// Answers requests from stdin until EOF
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let handler = boot(&config)?;
    log_event(Event::ServeStart, &[("data_dir", &config.data_dir)]);

    let mut dirty = false;
    let mut served = 0usize;
    for line in read_lines() {
        let line = line?;
        let response = match Request::parse(&line) {
            Ok(req) => {
                dirty |= req.is_write();
                handler.respond(req)
            }
            Err(e) => Response::error(&e),
        };
        write_json(&response.to_json())?;
        served += 1;
    }

    // Let a background rebuild finish so its final state reaches disk
    handler.subsystems().coordinator.wait()?;
    if dirty {
        persist_dataset(&config, &handler.subsystems().table)?;
    }
    log_event(Event::ServeStop, &[("served", &served.to_string())]);
    Ok(())
}

/// Answers one request, from `--json` or stdin
pub fn request(config_path: &Path, json: Option<String>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let handler = boot(&config)?;
    let raw = match json {
        Some(json) => json,
        None => read_request()?,
    };

    let response = match Request::parse(&raw) {
        Ok(req) => {
            let write = req.is_write();
            let response = handler.respond(req);
            if write && response.is_success() {
                persist_dataset(&config, &handler.subsystems().table)?;
            }
            response
        }
        Err(e) => Response::error(&e),
    };
    handler.subsystems().coordinator.wait()?;
    write_json(&response.to_json())
}

/// Runs a blocking rebuild and prints the report. Fails when any stage
/// failed, after printing.
pub fn rebuild(
    config_path: &Path,
    indexes: Vec<IndexName>,
    concurrency: Option<usize>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let handler = boot(&config)?;
    let names = if indexes.is_empty() {
        config.index_names()
    } else {
        indexes
    };
    let report = handler
        .subsystems()
        .coordinator
        .run_selected(&names, concurrency)?;
    let failed = report.failed;
    write_response(serde_json::to_value(&report).unwrap_or(Value::Null))?;
    if failed > 0 {
        return Err(CliError::RebuildFailed { failed });
    }
    Ok(())
}

/// Prints the persisted rebuild state as written by whichever process
/// last saved it. Does not load the dataset.
pub fn status(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let snapshot = JsonFileStateStore::new(config.rebuild_state_path()).load()?;
    write_response(json!({ "state": snapshot }))
}

/// Writes `count` synthetic galaxies, replacing the dataset
pub fn generate(config_path: &Path, count: usize, seed: u64) -> CliResult<()> {
    let config = load_config(config_path)?;
    require_initialized(&config)?;
    let galaxies = synthetic_galaxies(count, seed);
    let written = save_jsonl(&config.dataset_path(), &galaxies)?;
    write_response(json!({ "generated": written, "seed": seed }))
}

/// Deterministic for a given seed. Roughly one in ten galaxies has no
/// numeric id so the backfill has something to do.
pub fn synthetic_galaxies(count: usize, seed: u64) -> Vec<Galaxy> {
    let mut rng = StdRng::seed_from_u64(seed);
    let epoch_ms = 1_700_000_000_000i64;
    (0..count)
        .map(|i| {
            let mut g = Galaxy::new(format!("G{:07}", i + 1));
            if rng.gen_bool(0.9) {
                g.numeric_id = Some(i as i64 + 1);
            }
            g.ra = rng.gen_range(0.0..360.0);
            g.dec = rng.gen_range(-90.0..90.0);
            g.reff = rng.gen_range(0.5..20.0);
            g.reff_pixels = g.reff / 0.262;
            g.q = rng.gen_range(0.1..1.0);
            g.pa = rng.gen_range(0.0..180.0);
            g.nucleus = rng.gen_bool(0.3);
            g.mag = rng.gen_bool(0.95).then(|| rng.gen_range(14.0..24.0));
            g.mean_mue = rng.gen_bool(0.9).then(|| rng.gen_range(20.0..27.0));
            g.total_classifications = Some(rng.gen_range(0..12));
            g.num_visible_nucleus = Some(rng.gen_range(0..4));
            g.num_awesome_flag = Some(rng.gen_range(0..3));
            g.total_assigned = Some(rng.gen_range(0..5));
            g.created_at = epoch_ms + i as i64 * 1_000;
            g
        })
        .collect()
}
