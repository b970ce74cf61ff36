//! Observability
//!
//! Structured JSON logging with typed lifecycle events. Logging is
//! read-only: it never changes what an operation does.
//!
//! # Usage
//!
//! ```ignore
//! use cassandra_ops::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::CommandExecuted, &[("rc", "0")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = match event {
        Event::CommandRendered => Severity::Trace,
        e if e.is_failure() => Severity::Warn,
        _ => Severity::Info,
    };
    Logger::log(severity, event.as_str(), fields);
}
