// LogTab - app/coordinator.rs
//
// Lifecycle coordinator: binds the tail watcher to the job runner's two
// signals, the log path and the job status.
//
// States:
//   Idle      no session
//   Watching  one session bound to the current log path
//
// Transitions:
//   - A new non-empty path while running: stop any session, reset the
//     buffer, start a session on the new path.
//   - Status becomes running with a known path and no session: same.
//   - Status leaves running: deliver pending lines, stop the session, then
//     drain whatever the file gained since the last delivered line. The
//     buffer is kept as the run's final record.
//   - A new path while not running: show the file's content once, without
//     a session (the log of a run that already finished).
//   - mount (including a remount), unmount and drop: stop any session.
//
// Events are applied only if they carry the active session's id, so a
// stopped session's late lines never reach the buffer.

use crate::app::buffer::{LogBuffer, RenderNotice};
use crate::app::diagnostics::DiagnosticSink;
use crate::app::tail::{self, TailManager};
use crate::core::classify::PatternSet;
use crate::core::markup::{self, Markup};
use crate::core::model::{
    FileIdentity, JobStatus, SessionId, StatusSummary, TailEvent, WatchSession,
};
use crate::core::summary;
use crate::util::constants::{MAX_TAIL_EVENTS_PER_PUMP, MISSING_LOGFILE_MESSAGE};
use crate::util::error::TailError;
use crate::util::logging::preview;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Drives one mounted log view.
pub struct LogCoordinator {
    patterns: PatternSet,
    tail: TailManager,
    buffer: LogBuffer,
    sink: Box<dyn DiagnosticSink>,
    log_path: Option<PathBuf>,
    status: JobStatus,
    /// Offset just past the last line the active session delivered.
    delivered_offset: u64,
    /// File instance `delivered_offset` refers to.
    delivered_identity: Option<FileIdentity>,
    mounted: bool,
}

impl LogCoordinator {
    /// A coordinator in the Idle state. Nothing is watched until `mount`.
    pub fn new(patterns: PatternSet, tail: TailManager, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            patterns,
            tail,
            buffer: LogBuffer::new(),
            sink,
            log_path: None,
            status: JobStatus::NotStarted,
            delivered_offset: 0,
            delivered_identity: None,
            mounted: false,
        }
    }

    /// Attach to the host with the job's current signals.
    pub fn mount(&mut self, log_path: Option<PathBuf>, status: JobStatus) {
        // A session from an earlier mount belongs to a path that is no
        // longer known.
        self.stop_session();
        self.mounted = true;
        self.status = status;
        // A (re)mount binds to the path even if it is the one seen before.
        self.log_path = None;
        self.set_log_path(log_path);
    }

    /// Detach from the host. Stops any session regardless of state.
    pub fn unmount(&mut self) {
        self.stop_session();
        self.mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The job runner reports the log path of the current run.
    ///
    /// Unchanged or empty paths are ignored.
    pub fn set_log_path(&mut self, log_path: Option<PathBuf>) {
        let Some(path) = log_path.filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        if self.log_path.as_ref() == Some(&path) {
            return;
        }
        self.log_path = Some(path.clone());
        if !self.mounted {
            return;
        }
        if self.status.is_running() {
            self.watch(&path);
        } else {
            self.stop_session();
            self.load_snapshot(&path);
        }
    }

    /// The job runner reports a status change.
    pub fn set_job_status(&mut self, status: JobStatus) {
        let previous = self.status;
        if previous == status {
            return;
        }
        self.status = status;
        tracing::debug!(from = %previous, to = %status, "Job status changed");
        if !self.mounted {
            return;
        }

        if status.is_running() {
            if !self.tail.is_active() {
                if let Some(path) = self.log_path.clone() {
                    self.watch(&path);
                }
            }
        } else if self.tail.is_active() {
            self.finish_session();
        }
    }

    /// Apply pending tail events to the buffer. Returns how many lines were
    /// appended.
    pub fn pump(&mut self) -> usize {
        let events = self.tail.poll_events(MAX_TAIL_EVENTS_PER_PUMP);
        let mut appended = 0;
        let mut stale = 0;
        for event in events {
            match self.apply_event(event) {
                Applied::Line => appended += 1,
                Applied::Stale => stale += 1,
                Applied::Other => {}
            }
        }
        if stale > 0 {
            tracing::debug!(stale, "Discarded events from stopped sessions");
        }
        appended
    }

    /// Current log content.
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Receive a `RenderNotice` for every buffer change.
    pub fn subscribe(&mut self) -> mpsc::Receiver<RenderNotice> {
        self.buffer.subscribe()
    }

    pub fn active_session(&self) -> Option<&WatchSession> {
        self.tail.active_session()
    }

    pub fn is_watching(&self) -> bool {
        self.tail.is_active()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn job_status(&self) -> JobStatus {
        self.status
    }

    /// Banner state for the current status; `stderr` is the run's captured
    /// standard error and is only read when the run failed.
    pub fn summary(&self, stderr: Option<&str>) -> StatusSummary {
        summary::summarize(self.status, stderr)
    }

    /// Open the folder containing the log file. Refused while the run is
    /// still writing or when no log is known. Returns whether it was opened.
    pub fn reveal_log_file(&self) -> bool {
        match (&self.log_path, self.status.can_reveal_log()) {
            (Some(path), true) => {
                crate::platform::fs::reveal_in_file_manager(path);
                true
            }
            _ => false,
        }
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    /// Idle/Watching -> Watching on `path`.
    fn watch(&mut self, path: &Path) {
        self.stop_session();
        self.buffer.reset();
        self.delivered_offset = 0;
        self.delivered_identity = None;

        match self.tail.start_tail(path) {
            Ok(session) => self.sink.session_started(&session),
            Err(err) => self.report_start_failure(path, err),
        }
    }

    /// Watching -> Idle because the run ended: flush everything the log holds.
    fn finish_session(&mut self) {
        let Some(session) = self.tail.active_session().cloned() else {
            return;
        };
        while self.pump() > 0 {}
        self.stop_session();

        let start = self.drain_start(&session.path);
        match tail::read_from(&session.path, start) {
            Ok(lines) => {
                if !lines.is_empty() {
                    tracing::debug!(
                        session = %session.id,
                        lines = lines.len(),
                        "Drained log after run ended"
                    );
                }
                for line in lines {
                    self.append_line(&line);
                }
            }
            Err(e) => self.sink.read_failure(&TailError::Read {
                path: session.path.clone(),
                operation: "drain",
                source: e,
            }),
        }
    }

    /// Where the post-run drain resumes: the last delivered offset, unless the
    /// file was replaced or truncated after that line, in which case the
    /// whole new content is undelivered.
    fn drain_start(&self, path: &Path) -> u64 {
        match std::fs::metadata(path) {
            Ok(meta)
                if self.delivered_identity == Some(tail::file_identity(&meta))
                    && meta.len() >= self.delivered_offset =>
            {
                self.delivered_offset
            }
            Ok(_) => {
                tracing::debug!(
                    file = %path.display(),
                    "Log changed since the last delivered line; draining from the start"
                );
                0
            }
            // Unreadable: the drain reports the failure.
            Err(_) => self.delivered_offset,
        }
    }

    /// Stop the running session, if any.
    fn stop_session(&mut self) {
        if let Some(session) = self.tail.stop_tail() {
            self.sink.session_stopped(&session);
        }
    }

    /// Show a finished run's log without following it.
    fn load_snapshot(&mut self, path: &Path) {
        self.buffer.reset();
        if !path.is_file() {
            self.report_start_failure(
                path,
                TailError::MissingFile {
                    path: path.to_path_buf(),
                },
            );
            return;
        }
        match tail::read_from(path, 0) {
            Ok(lines) => {
                for line in lines {
                    self.append_line(&line);
                }
            }
            Err(e) => self.sink.read_failure(&TailError::Read {
                path: path.to_path_buf(),
                operation: "read",
                source: e,
            }),
        }
    }

    fn report_start_failure(&mut self, path: &Path, err: TailError) {
        if err.is_missing_file() {
            self.sink.missing_file(path);
            self.buffer
                .replace(Markup::text(&missing_file_message(path)));
        } else {
            self.sink.read_failure(&err);
        }
    }

    // ── Event application ───────────────────────────────────────────────────

    fn apply_event(&mut self, event: TailEvent) -> Applied {
        let active = self.tail.active_session().map(|s| s.id);
        if !is_current(active, event.session()) {
            return Applied::Stale;
        }
        match event {
            TailEvent::Line {
                text, end_offset, ..
            } => {
                self.delivered_offset = end_offset;
                self.append_line(&text);
                Applied::Line
            }
            TailEvent::Opened { identity, .. } => {
                self.delivered_offset = 0;
                self.delivered_identity = Some(identity);
                Applied::Other
            }
            TailEvent::Failed { error, .. } => {
                self.sink.read_failure(&error);
                Applied::Other
            }
            TailEvent::Started { session, .. } | TailEvent::Stopped { session } => {
                tracing::trace!(session = %session, "Tail lifecycle event");
                Applied::Other
            }
        }
    }

    fn append_line(&mut self, line: &str) {
        let classified = self.patterns.classify_line(line);
        tracing::trace!(
            label = ?classified.label,
            timestamp = ?classified.timestamp,
            line = preview(&classified.raw_text),
            "Classified line"
        );
        let markup = markup::encode(
            &format!("{}\n", classified.raw_text),
            classified.label.as_deref(),
        );
        self.buffer.append(markup);
    }
}

impl Drop for LogCoordinator {
    fn drop(&mut self) {
        if self.mounted {
            self.unmount();
        }
    }
}

/// Outcome of applying one tail event.
enum Applied {
    Line,
    Stale,
    Other,
}

fn is_current(active: Option<SessionId>, event: SessionId) -> bool {
    active == Some(event)
}

/// Placeholder text shown instead of a missing log.
pub fn missing_file_message(path: &Path) -> String {
    format!("{MISSING_LOGFILE_MESSAGE}\n{}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorded {
        missing: Vec<PathBuf>,
        failures: usize,
        started: Vec<SessionId>,
        stopped: Vec<SessionId>,
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Recorded>>);

    impl DiagnosticSink for RecordingSink {
        fn missing_file(&self, path: &Path) {
            self.0.borrow_mut().missing.push(path.to_path_buf());
        }
        fn read_failure(&self, _error: &TailError) {
            self.0.borrow_mut().failures += 1;
        }
        fn session_started(&self, session: &WatchSession) {
            self.0.borrow_mut().started.push(session.id);
        }
        fn session_stopped(&self, session: &WatchSession) {
            self.0.borrow_mut().stopped.push(session.id);
        }
    }

    fn coordinator() -> (LogCoordinator, RecordingSink) {
        let sink = RecordingSink::default();
        let c = LogCoordinator::new(
            PatternSet::for_module("natcap.invest.carbon"),
            TailManager::with_poll_interval(Duration::from_millis(20)),
            Box::new(sink.clone()),
        );
        (c, sink)
    }

    fn append(path: &Path, text: &str) {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn pump_until(c: &mut LogCoordinator, done: impl Fn(&LogCoordinator) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(c) && Instant::now() < deadline {
            c.pump();
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_missing_file_shows_placeholder() {
        let (mut c, sink) = coordinator();
        c.mount(Some(PathBuf::from("/no/such/file.log")), JobStatus::Running);
        assert_eq!(c.buffer().content(), "Logfile is missing: \n/no/such/file.log");
        assert!(!c.is_watching());
        assert_eq!(sink.0.borrow().missing.len(), 1);
    }

    #[test]
    fn test_stale_events_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "").unwrap();

        let (mut c, _sink) = coordinator();
        c.mount(Some(path), JobStatus::Running);
        let active = c.active_session().unwrap().id;
        let foreign = SessionId(active.get() + 100);

        let applied = c.apply_event(TailEvent::Line {
            session: foreign,
            text: "from another session".to_string(),
            end_offset: 21,
        });
        assert!(matches!(applied, Applied::Stale));
        assert!(c.buffer().is_empty());
    }

    #[test]
    fn test_lines_are_classified_and_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(
            &path,
            "2020-10-16 07:13:04,325 carbon starting\n<b>raw</b>\nValueError: x\n",
        )
        .unwrap();

        let (mut c, _sink) = coordinator();
        c.mount(Some(path), JobStatus::Running);
        pump_until(&mut c, |c| c.buffer().line_count() >= 3);

        assert_eq!(
            c.buffer().content(),
            "<span class=\"log-primary\">2020-10-16 07:13:04,325 carbon starting\n</span>\
             raw\n\
             <span class=\"log-error\">ValueError: x\n</span>"
        );
    }

    #[test]
    fn test_status_leaving_running_stops_and_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "one\n").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path.clone()), JobStatus::Running);
        pump_until(&mut c, |c| c.buffer().line_count() >= 1);

        // Written after the last poll, with no trailing newline.
        append(&path, "two\nlast");
        c.set_job_status(JobStatus::Success);

        assert!(!c.is_watching());
        assert_eq!(c.buffer().content(), "one\ntwo\nlast\n");
        assert_eq!(sink.0.borrow().stopped.len(), 1);

        // Nothing more arrives once idle.
        append(&path, "\nlate\n");
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(c.pump(), 0);
        assert_eq!(c.buffer().content(), "one\ntwo\nlast\n");
    }

    /// Swap a new file instance in at `path`, the way a restarted job does.
    fn replace_file(path: &Path, text: &str) {
        let staged = path.with_extension("new");
        std::fs::write(&staged, text).unwrap();
        std::fs::rename(&staged, path).unwrap();
    }

    #[test]
    fn test_finish_drains_replaced_file_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "one\n").unwrap();

        let (mut c, _sink) = coordinator();
        c.mount(Some(path.clone()), JobStatus::Running);
        pump_until(&mut c, |c| c.buffer().line_count() >= 1);

        // Same length as the delivered content plus more; none of it may be
        // skipped by resuming at the old offset.
        replace_file(&path, "two\nthree\n");
        c.set_job_status(JobStatus::Success);

        assert_eq!(c.buffer().content(), "one\ntwo\nthree\n");
    }

    #[test]
    fn test_remount_without_path_stops_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path.clone()), JobStatus::Running);
        assert!(c.is_watching());

        c.mount(None, JobStatus::Running);
        assert!(!c.is_watching());
        assert!(c.log_path().is_none());
        assert_eq!(sink.0.borrow().stopped.len(), 1);

        append(&path, "orphan\n");
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(c.pump(), 0);
        assert!(!c.buffer().content().contains("orphan"));
    }

    #[test]
    fn test_read_failure_reported_once_and_session_stays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "one\n").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path.clone()), JobStatus::Running);
        pump_until(&mut c, |c| c.buffer().line_count() >= 1);

        std::fs::remove_file(&path).unwrap();
        pump_until(&mut c, |_| sink.0.borrow().failures >= 1);
        // Several more poll ticks of the same failure.
        let until = Instant::now() + Duration::from_millis(150);
        while Instant::now() < until {
            c.pump();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.0.borrow().failures, 1);
        assert!(c.is_watching());

        // The path comes back as a new file: read in full.
        std::fs::write(&path, "two\n").unwrap();
        pump_until(&mut c, |c| c.buffer().line_count() >= 2);
        assert_eq!(c.buffer().content(), "one\ntwo\n");
    }

    #[test]
    fn test_unchanged_status_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path), JobStatus::Running);
        c.set_job_status(JobStatus::Running);
        assert!(c.is_watching());
        assert_eq!(sink.0.borrow().started.len(), 1);
    }

    #[test]
    fn test_finished_run_log_loaded_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "Traceback (most recent call last):\n  boom\n").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path), JobStatus::Error);
        assert!(!c.is_watching());
        assert!(sink.0.borrow().started.is_empty());
        assert_eq!(c.buffer().line_count(), 2);
        assert!(c.buffer().content().starts_with("<span class=\"log-error\">"));
    }

    #[test]
    fn test_running_after_snapshot_starts_watching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "first\n").unwrap();

        let (mut c, _sink) = coordinator();
        c.mount(Some(path), JobStatus::NotStarted);
        assert_eq!(c.buffer().content(), "first\n");

        c.set_job_status(JobStatus::Running);
        assert!(c.is_watching());
        pump_until(&mut c, |c| c.buffer().line_count() >= 1);
        // Reset on watch start, then re-read from the beginning.
        assert_eq!(c.buffer().content(), "first\n");
    }

    #[test]
    fn test_unmount_stops_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "").unwrap();

        let (mut c, sink) = coordinator();
        c.mount(Some(path), JobStatus::Running);
        c.unmount();
        c.unmount();
        drop(c);
        assert_eq!(sink.0.borrow().stopped.len(), 1);
    }

    #[test]
    fn test_error_summary_without_logfile() {
        let (mut c, _sink) = coordinator();
        c.mount(None, JobStatus::Running);
        c.set_job_status(JobStatus::Error);
        assert_eq!(
            c.summary(Some("Traceback...\nValueError: bad input\n")),
            StatusSummary::Failed {
                last_line: "ValueError: bad input".to_string()
            }
        );
    }

    #[test]
    fn test_reveal_refused_while_running() {
        let (mut c, _sink) = coordinator();
        c.mount(Some(PathBuf::from("/no/such/file.log")), JobStatus::Running);
        assert!(!c.reveal_log_file());
    }
}
