//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Operational counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: it never decides what the state machine does.
//!
//! ```ignore
//! use cnode_state_machine::observability::{Logger, Event, log_event};
//!
//! Logger::info("JOB_COMPLETED", &[("job_name", "monitor")]);
//! log_event(Event::BootStart);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_error() {
        Severity::Error
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
