//! Observability for the replication commit path
//!
//! - Structured JSON logging ([`Logger`])
//! - Typed event names ([`Event`])
//! - Relaxed atomic counters ([`CommitMetrics`])
//! - Optional batched, rotating error log file ([`BufferedErrorLog`]) that
//!   receives every logged line once installed
//!
//! Observability never changes the outcome of a commit: every sink here
//! swallows its own failures.
//!
//! ```ignore
//! use certcommit::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::CertKeyMissing, &[("db", "test"), ("name", "t1")]);
//! ```

mod buffered;
mod events;
mod logger;
mod metrics;

pub use buffered::{install_error_log, uninstall_error_log, BufferedErrorLog, BufferedLogConfig};
pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{CommitMetrics, MetricsSnapshot};

/// Log an event at its default severity
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log an event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(default_severity(event), event.as_str(), fields);
}

/// Severity an event is reported at unless the caller overrides it
pub fn default_severity(event: Event) -> Severity {
    match event {
        Event::CommitOrderViolation => Severity::Fatal,
        Event::WritesetCacheReinitFailed
        | Event::WritesetAppendFailed
        | Event::WritesetDumpFailed
        | Event::LocalCommitFailed => Severity::Error,
        Event::WritesetSizeLimit
        | Event::CertKeyMissing
        | Event::CertificationAborted
        | Event::BufferedLogDisabled => Severity::Warn,
        _ => Severity::Info,
    }
}
