//! Observability for kvpipe
//!
//! - Structured JSON logging to stderr
//! - Relaxed atomic counters
//! - Begin/complete scopes around runs
//!
//! Observability is read-only: nothing here changes what a run returns.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Logs a one-shot event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::write_line(&render_event(event, fields));
}

/// Line `log_event` would write
pub fn render_event(event: Event, fields: &[(&str, &str)]) -> String {
    Logger::render(event.severity(), event.as_str(), fields)
}
