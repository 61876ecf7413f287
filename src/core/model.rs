// LogTab - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no UI.
//
// These types are the shared vocabulary across all layers.

use crate::util::error::TailError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

// =============================================================================
// Job status (external signal)
// =============================================================================

/// Status of the external job whose log is being displayed.
///
/// Transitions are driven by the job runner, never by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// No run has been started, or the status is unknown.
    #[default]
    NotStarted,
    Running,
    Success,
    Error,
    Canceled,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    /// Whether the host may offer to open the log's folder. Disabled while a
    /// run is still writing to it.
    pub fn can_reveal_log(&self) -> bool {
        !self.is_running()
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not started",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Classified line
// =============================================================================

/// One log line after classification. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedLine {
    /// The line as read from the file, without its terminator.
    pub raw_text: String,

    /// Label of the first matching pattern, if any.
    pub label: Option<String>,

    /// Timestamp from the `YYYY-MM-DD HH:MM:SS,mmm` line prefix, if present.
    pub timestamp: Option<NaiveDateTime>,
}

// =============================================================================
// Watch sessions
// =============================================================================

/// Identity of one tail session. Unique within the `TailManager` that
/// issued it, so events from a stopped session can be told apart from
/// events of its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Surface everything already in the file, then follow appends.
    FromBeginning,
}

/// The live binding between one log file and its event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSession {
    pub id: SessionId,
    pub path: PathBuf,
    pub start: StartMode,
}

/// Distinguishes one file instance from another created at the same path.
///
/// `dev`/`ino` are zero where the platform has no inode numbers; `created`
/// is `None` where the filesystem does not record a birth time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
    pub created: Option<SystemTime>,
}

// =============================================================================
// Tail events (watcher thread -> coordinator)
// =============================================================================

/// Messages sent from a tail thread to its owner.
#[derive(Debug)]
pub enum TailEvent {
    /// The session's thread is running.
    Started { session: SessionId, path: PathBuf },

    /// Reading (re)started at offset 0 of the file instance `identity`:
    /// on the first read, after truncation, or after the file was replaced.
    /// Offsets of later `Line` events refer to this instance.
    Opened {
        session: SessionId,
        identity: FileIdentity,
    },

    /// One newline-terminated line, terminator stripped.
    /// `end_offset` is the file offset just past the line's terminator.
    Line {
        session: SessionId,
        text: String,
        end_offset: u64,
    },

    /// A non-fatal I/O failure; the session keeps polling.
    Failed { session: SessionId, error: TailError },

    /// The session's thread observed its cancel flag and exited.
    Stopped { session: SessionId },
}

impl TailEvent {
    /// The session this event belongs to.
    pub fn session(&self) -> SessionId {
        match self {
            TailEvent::Started { session, .. }
            | TailEvent::Opened { session, .. }
            | TailEvent::Line { session, .. }
            | TailEvent::Failed { session, .. }
            | TailEvent::Stopped { session } => *session,
        }
    }
}

// =============================================================================
// Status summary (coordinator -> host banners)
// =============================================================================

/// Status-derived summary shown by the host next to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StatusSummary {
    /// Nothing to show (no run yet).
    None,
    /// The run is in progress and may be canceled by the host.
    Running { can_cancel: bool },
    /// The run failed; `last_line` is the last non-blank stderr line.
    Failed { last_line: String },
    /// The run completed successfully.
    Complete { message: String },
    /// The run was canceled.
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_disabled_only_while_running() {
        assert!(!JobStatus::Running.can_reveal_log());
        for status in [
            JobStatus::NotStarted,
            JobStatus::Success,
            JobStatus::Error,
            JobStatus::Canceled,
        ] {
            assert!(status.can_reveal_log(), "{status} should allow reveal");
        }
    }

    #[test]
    fn test_status_deserialises_kebab_case() {
        let s: JobStatus = serde_json::from_str("\"not-started\"").unwrap();
        assert_eq!(s, JobStatus::NotStarted);
        let s: JobStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(s, JobStatus::Canceled);
    }

    #[test]
    fn test_event_session_accessor() {
        let ev = TailEvent::Stopped {
            session: SessionId(7),
        };
        assert_eq!(ev.session().get(), 7);
    }
}
