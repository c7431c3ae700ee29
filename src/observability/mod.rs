//! Observability
//!
//! - Structured JSON logging with deterministic key order
//! - Typed lifecycle events
//! - Relaxed atomic counters
//! - Begin/complete scopes around rebuild runs
//!
//! Observability is read-only: nothing here can fail the operation it
//! describes.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its default severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.default_severity(), event.as_str(), fields);
}
