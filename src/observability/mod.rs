//! Observability for the harness
//!
//! Progress is reported at every lifecycle milestone so a human can line
//! harness actions up with server and client logs.
//!
//! ```ignore
//! use rmdb_harness::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::ServerSpawned, &[("pid", "4242")]);
//!
//! let scope = ObservationScope::new("PHASE1");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

fn severity_for(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}
