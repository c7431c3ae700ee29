//! `galaxydb.json`
//!
//! Only `data_dir` is required; everything else has a default.
//!
//! ```json
//! {
//!   "data_dir": "./galaxy-data",
//!   "rebuild_batch_size": 50,
//!   "rebuild_concurrency": 4,
//!   "indexes": ["ra", "dec", "numericId"]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use crate::count::CountLimits;
use crate::index::IndexName;
use crate::observability::Severity;
use crate::query::PageLimits;
use crate::rebuild::RebuildSettings;

pub const DATASET_FILE: &str = "galaxies.jsonl";
pub const REBUILD_STATE_FILE: &str = "rebuild_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Holds the dataset and the persisted rebuild state
    pub data_dir: String,

    #[serde(default = "default_rebuild_batch_size")]
    pub rebuild_batch_size: usize,

    #[serde(default = "default_clear_batch_size")]
    pub clear_batch_size: usize,

    #[serde(default = "default_rebuild_concurrency")]
    pub rebuild_concurrency: usize,

    #[serde(default = "default_count_batch_size")]
    pub count_batch_size: usize,

    #[serde(default = "default_max_count_batch_size")]
    pub max_count_batch_size: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,

    /// Indexes to maintain; all of them when absent
    #[serde(default)]
    pub indexes: Option<Vec<IndexName>>,

    /// Minimum log severity (TRACE, INFO, WARN, ERROR, FATAL)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rebuild_batch_size() -> usize {
    50
}
fn default_clear_batch_size() -> usize {
    500
}
fn default_rebuild_concurrency() -> usize {
    4
}
fn default_count_batch_size() -> usize {
    500
}
fn default_max_count_batch_size() -> usize {
    5_000
}
fn default_page_size() -> usize {
    100
}
fn default_max_page_size() -> usize {
    500
}
fn default_backfill_batch_size() -> usize {
    200
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Config {
    /// Config with every default and the given data directory
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            rebuild_batch_size: default_rebuild_batch_size(),
            clear_batch_size: default_clear_batch_size(),
            rebuild_concurrency: default_rebuild_concurrency(),
            count_batch_size: default_count_batch_size(),
            max_count_batch_size: default_max_count_batch_size(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            backfill_batch_size: default_backfill_batch_size(),
            indexes: None,
            log_level: default_log_level(),
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::invalid("data_dir", "must not be empty"));
        }
        let positive = [
            ("rebuild_batch_size", self.rebuild_batch_size),
            ("clear_batch_size", self.clear_batch_size),
            ("rebuild_concurrency", self.rebuild_concurrency),
            ("count_batch_size", self.count_batch_size),
            ("max_count_batch_size", self.max_count_batch_size),
            ("default_page_size", self.default_page_size),
            ("max_page_size", self.max_page_size),
            ("backfill_batch_size", self.backfill_batch_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if self.count_batch_size > self.max_count_batch_size {
            return Err(ConfigError::invalid(
                "count_batch_size",
                format!("{} exceeds max_count_batch_size {}", self.count_batch_size, self.max_count_batch_size),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::invalid(
                "default_page_size",
                format!("{} exceeds max_page_size {}", self.default_page_size, self.max_page_size),
            ));
        }
        if matches!(&self.indexes, Some(names) if names.is_empty()) {
            return Err(ConfigError::invalid("indexes", "must name at least one index"));
        }
        self.severity()?;
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_path().join(DATASET_FILE)
    }

    pub fn rebuild_state_path(&self) -> PathBuf {
        self.data_path().join(REBUILD_STATE_FILE)
    }

    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| ConfigError::invalid("log_level", format!("unknown level '{}'", self.log_level)))
    }

    pub fn index_names(&self) -> Vec<IndexName> {
        match &self.indexes {
            Some(names) => names.clone(),
            None => IndexName::ALL.to_vec(),
        }
    }

    pub fn rebuild_settings(&self) -> RebuildSettings {
        RebuildSettings {
            clear_batch_size: self.clear_batch_size,
            rebuild_batch_size: self.rebuild_batch_size,
            default_concurrency: self.rebuild_concurrency,
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }

    pub fn count_limits(&self) -> CountLimits {
        CountLimits {
            default_batch_size: self.count_batch_size,
            max_batch_size: self.max_count_batch_size,
        }
    }
}
