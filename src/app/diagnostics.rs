// LogTab - app/diagnostics.rs
//
// Diagnostics capability injected into the coordinator at construction.
// The coordinator reports through this trait instead of a process-wide
// logger, so each mounted view can carry its own context and tests can
// observe what was reported.

use crate::core::model::WatchSession;
use crate::util::error::TailError;
use std::path::Path;

/// Receives the coordinator's non-fatal conditions.
pub trait DiagnosticSink {
    /// The log file did not exist when a watch was attempted.
    fn missing_file(&self, path: &Path);

    /// An I/O failure on a running watch, or while loading a finished log.
    fn read_failure(&self, error: &TailError);

    fn session_started(&self, _session: &WatchSession) {}

    fn session_stopped(&self, _session: &WatchSession) {}
}

/// Forwards diagnostics to `tracing`, tagged with the job's module name.
#[derive(Debug, Clone)]
pub struct TracingSink {
    module: String,
}

impl TracingSink {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn missing_file(&self, path: &Path) {
        tracing::error!(
            module = %self.module,
            file = %path.display(),
            "Not able to read log file"
        );
    }

    fn read_failure(&self, error: &TailError) {
        tracing::warn!(module = %self.module, error = %error, "Log read failure");
    }

    fn session_started(&self, session: &WatchSession) {
        tracing::debug!(
            module = %self.module,
            session = %session.id,
            file = %session.path.display(),
            "Watching log file"
        );
    }

    fn session_stopped(&self, session: &WatchSession) {
        tracing::debug!(
            module = %self.module,
            session = %session.id,
            file = %session.path.display(),
            "Unwatching log file"
        );
    }
}
