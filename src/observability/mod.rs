//! Observability for storr
//!
//! Structured JSON logging of lifecycle events and of the soft-fail
//! diagnostics emitted by type checking. Logging never affects the
//! outcome of an operation.
//!
//! ```ignore
//! use storr::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! log_event_with_fields(Event::RepositoryCreated, &[("repository", "people")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::StoreOpened);
        log_event(Event::RecordPersisted);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::BucketCreated, &[("bucket", "people")]);
    }
}
