//! Forward scan continuation and cooperative stop signal
//!
//! Every multi-batch operation (rebuild stage, exact count, backfill) walks
//! the store through `RecordStore::scan` and hands a `ScanCursor` back to its
//! caller between batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::errors::{RecordError, RecordResult};
use super::galaxy::{Galaxy, RecordId};

/// Position after the last record returned by a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor(pub RecordId);

impl ScanCursor {
    /// Opaque token handed to callers
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0 .0.to_be_bytes())
    }

    pub fn decode(token: &str) -> RecordResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| RecordError::InvalidCursor(e.to_string()))?;
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| RecordError::InvalidCursor("wrong token length".into()))?;
        Ok(ScanCursor(RecordId(u64::from_be_bytes(raw))))
    }

    /// Decodes an optional token
    pub fn decode_opt(token: Option<&str>) -> RecordResult<Option<Self>> {
        token.map(Self::decode).transpose()
    }
}

/// One batch of a forward scan
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub records: Vec<(RecordId, Galaxy)>,
    /// Resume point; `None` only when the scan started at the beginning and
    /// found nothing
    pub continue_cursor: Option<ScanCursor>,
    /// True when no record exists after this page
    pub is_done: bool,
}

/// Cooperative cancellation flag, checked between batches
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_token_round_trip() {
        let cursor = ScanCursor(RecordId(42_000));
        assert_eq!(ScanCursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!(
            ScanCursor::decode("!!not base64"),
            Err(RecordError::InvalidCursor(_))
        ));
        assert!(ScanCursor::decode("AAAA").is_err());
        assert_eq!(ScanCursor::decode_opt(None).unwrap(), None);
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let signal = StopSignal::new();
        let other = signal.clone();
        other.stop();
        assert!(signal.is_stopped());
        signal.reset();
        assert!(!other.is_stopped());
    }
}
