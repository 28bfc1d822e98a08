//! Observable events
//!
//! Every log line emitted by the crate names one of these events.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Simulation run started
    SimulationStart,
    /// Simulation run finished
    SimulationComplete,

    // Ordered commit
    /// Structural violation of the commit order (double register etc.)
    CommitOrderViolation,
    /// Local commit failed after certification
    LocalCommitFailed,

    // Write-set streaming
    /// Write-set exceeded the configured maximum size
    WritesetSizeLimit,
    /// Staging cache could not be repositioned
    WritesetCacheReinitFailed,
    /// Provider rejected a write-set append
    WritesetAppendFailed,
    /// Rejected write-set dumped to disk
    WritesetDumped,
    /// Write-set dump failed
    WritesetDumpFailed,

    // Certification
    /// Provider aborted the transaction during certification
    CertificationAborted,
    /// A held table lock has no matching certification key
    CertKeyMissing,

    // Recovery
    /// Global position recovered or written at startup
    PositionRecovered,

    // Connections
    /// Provider opened a connection
    ConnectionAdded,
    /// Provider closed a connection
    ConnectionRemoved,

    // Buffered error log
    /// Buffered error log opened
    BufferedLogOpened,
    /// Buffered error log disabled after an I/O failure
    BufferedLogDisabled,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SimulationStart => "SIMULATION_START",
            Event::SimulationComplete => "SIMULATION_COMPLETE",
            Event::CommitOrderViolation => "COMMIT_ORDER_VIOLATION",
            Event::LocalCommitFailed => "LOCAL_COMMIT_FAILED",
            Event::WritesetSizeLimit => "WRITESET_SIZE_LIMIT",
            Event::WritesetCacheReinitFailed => "WRITESET_CACHE_REINIT_FAILED",
            Event::WritesetAppendFailed => "WRITESET_APPEND_FAILED",
            Event::WritesetDumped => "WRITESET_DUMPED",
            Event::WritesetDumpFailed => "WRITESET_DUMP_FAILED",
            Event::CertificationAborted => "CERTIFICATION_ABORTED",
            Event::CertKeyMissing => "CERT_KEY_MISSING",
            Event::PositionRecovered => "POSITION_RECOVERED",
            Event::ConnectionAdded => "CONNECTION_ADDED",
            Event::ConnectionRemoved => "CONNECTION_REMOVED",
            Event::BufferedLogOpened => "BUFFERED_LOG_OPENED",
            Event::BufferedLogDisabled => "BUFFERED_LOG_DISABLED",
        }
    }

    /// Whether this event reports a broken invariant
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::CommitOrderViolation)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
