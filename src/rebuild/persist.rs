//! Persisted rebuild progress
//!
//! The snapshot is written after every batch so that any observer (another
//! CLI invocation, a status request) sees live progress. The file store
//! writes a temp file and renames it over the old one, and guards the
//! payload with a CRC32 so a torn or hand-edited file is detected on load.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{RebuildError, RebuildResult};
use super::state::RebuildSnapshot;

pub trait RebuildStateStore: Send + Sync {
    fn load(&self) -> RebuildResult<Option<RebuildSnapshot>>;
    fn save(&self, snapshot: &RebuildSnapshot) -> RebuildResult<()>;
}

/// Keeps the snapshot in memory only
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<RebuildSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RebuildStateStore for MemoryStateStore {
    fn load(&self) -> RebuildResult<Option<RebuildSnapshot>> {
        Ok(self.inner.lock().map_err(|_| RebuildError::LockPoisoned)?.clone())
    }

    fn save(&self, snapshot: &RebuildSnapshot) -> RebuildResult<()> {
        *self.inner.lock().map_err(|_| RebuildError::LockPoisoned)? = Some(snapshot.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    checksum: u32,
    state: Value,
}

fn checksum(state: &Value) -> RebuildResult<u32> {
    let bytes = serde_json::to_vec(state).map_err(|e| RebuildError::StateCorrupted(e.to_string()))?;
    Ok(crc32fast::hash(&bytes))
}

/// JSON file with atomic replace
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RebuildStateStore for JsonFileStateStore {
    fn load(&self) -> RebuildResult<Option<RebuildSnapshot>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RebuildError::state_io(&self.path, e)),
        };
        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|e| RebuildError::StateCorrupted(e.to_string()))?;
        let actual = checksum(&envelope.state)?;
        if actual != envelope.checksum {
            return Err(RebuildError::StateCorrupted(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                envelope.checksum, actual
            )));
        }
        let snapshot = serde_json::from_value(envelope.state)
            .map_err(|e| RebuildError::StateCorrupted(e.to_string()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &RebuildSnapshot) -> RebuildResult<()> {
        let state =
            serde_json::to_value(snapshot).map_err(|e| RebuildError::StateCorrupted(e.to_string()))?;
        let envelope = Envelope {
            checksum: checksum(&state)?,
            state,
        };
        let text = serde_json::to_string_pretty(&envelope)
            .map_err(|e| RebuildError::StateCorrupted(e.to_string()))?;

        let temp = self.temp_path();
        fs::write(&temp, text).map_err(|e| RebuildError::state_io(&temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| RebuildError::state_io(&self.path, e))?;
        Ok(())
    }
}
