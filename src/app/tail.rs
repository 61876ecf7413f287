// LogTab - app/tail.rs
//
// Live tail: watches one job log for appended lines and streams them to the
// owner in file order.
//
// Architecture:
//   - `TailManager` lives on the owner's thread; `run_tail_watcher` runs on a
//     background thread polling the file on a fixed interval.
//   - One `mpsc` channel is owned by the manager and shared by every session
//     it starts. Each event carries its `SessionId`, so the owner can discard
//     late events from a session it already stopped.
//   - An `Arc<AtomicBool>` cancel flag per session allows a synchronous stop.
//
// Reading starts at offset 0 of the file's current content, so a log that
// already has lines when the watch begins is surfaced in full.
//
// Encoding: lines are split on raw bytes and decoded as lossy UTF-8, so the
// reported offsets are exact byte positions.
//
// Failure handling:
//   - A missing file at start is reported synchronously as
//     `TailError::MissingFile`; no thread is spawned.
//   - Stat/read errors afterwards are non-fatal: logged as warnings, a
//     `TailEvent::Failed` is sent, and the watcher keeps polling.
//   - A failure streak is reported once: the first failure is a warning and
//     a `Failed` event, repeats are logged at debug until a read succeeds.
//   - Truncated files (size < last offset) and replaced files (different
//     identity, or the path vanished in between) are re-read from offset 0
//     and announced with `TailEvent::Opened`.
//   - MAX_TAIL_READ_BYTES_PER_TICK caps the bytes consumed per tick.

use crate::core::model::{FileIdentity, SessionId, StartMode, TailEvent, WatchSession};
use crate::util::constants::{
    MAX_TAIL_PARTIAL_BYTES, MAX_TAIL_READ_BYTES_PER_TICK, TAIL_CANCEL_CHECK_INTERVAL_MS,
    TAIL_POLL_INTERVAL_MS,
};
use crate::util::error::TailError;
use std::fs::Metadata;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

// =============================================================================
// TailManager
// =============================================================================

/// The running session and its cancel flag.
struct ActiveTail {
    session: WatchSession,
    cancel: Arc<AtomicBool>,
}

/// Manages at most one live tail on a background thread.
pub struct TailManager {
    tx: mpsc::Sender<TailEvent>,
    rx: mpsc::Receiver<TailEvent>,
    active: Option<ActiveTail>,
    next_session: u64,
    poll_interval: Duration,
}

impl TailManager {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(TAIL_POLL_INTERVAL_MS))
    }

    /// A manager whose sessions poll every `poll_interval`.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            active: None,
            next_session: 1,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Start tailing `path` from the beginning of its current content.
    ///
    /// Any running session is stopped first. Returns `TailError::MissingFile`
    /// without starting anything if the file does not exist.
    pub fn start_tail(&mut self, path: &Path) -> Result<WatchSession, TailError> {
        self.stop_tail();

        if !path.is_file() {
            tracing::warn!(file = %path.display(), "Tail: log file is missing");
            return Err(TailError::MissingFile {
                path: path.to_path_buf(),
            });
        }

        let session = WatchSession {
            id: SessionId(self.next_session),
            path: path.to_path_buf(),
            start: StartMode::FromBeginning,
        };
        self.next_session += 1;

        let cancel = Arc::new(AtomicBool::new(false));
        let tx = self.tx.clone();
        let thread_cancel = Arc::clone(&cancel);
        let thread_path = session.path.clone();
        let id = session.id;
        let interval = self.poll_interval;
        std::thread::spawn(move || {
            run_tail_watcher(id, thread_path, interval, tx, thread_cancel);
        });

        tracing::info!(session = %id, file = %path.display(), "Live tail started");
        self.active = Some(ActiveTail {
            session: session.clone(),
            cancel,
        });
        Ok(session)
    }

    /// Stop the running session, if any. Returns the session that was stopped.
    ///
    /// Idempotent: a second call returns `None` and does nothing.
    pub fn stop_tail(&mut self) -> Option<WatchSession> {
        let active = self.active.take()?;
        active.cancel.store(true, Ordering::SeqCst);
        tracing::debug!(
            session = %active.session.id,
            file = %active.session.path.display(),
            "Live tail stopped"
        );
        Some(active.session)
    }

    /// Stop `id` if it is the running session. Stopping a session that is
    /// already stopped, or was never started here, is a no-op.
    pub fn stop_session(&mut self, id: SessionId) -> bool {
        if self.active_session().is_some_and(|s| s.id == id) {
            self.stop_tail().is_some()
        } else {
            false
        }
    }

    /// The running session, if any.
    pub fn active_session(&self) -> Option<&WatchSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// Returns `true` if a tail background thread is currently active.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Drain pending events without blocking, up to `max` of them.
    ///
    /// Events from stopped sessions are returned too; filtering by session
    /// identity is the caller's job.
    pub fn poll_events(&self, max: usize) -> Vec<TailEvent> {
        self.rx.try_iter().take(max).collect()
    }
}

impl Default for TailManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TailManager {
    fn drop(&mut self) {
        self.stop_tail();
    }
}

// =============================================================================
// One-shot reads
// =============================================================================

/// Read every line of `path` from byte `offset` to the end, including a final
/// line with no terminator.
///
/// Used to drain what a stopped session had not delivered yet, and to show
/// the log of a run that is no longer writing to it.
pub fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<String>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let mut lines: Vec<String> = split_complete_lines(&mut bytes)
        .into_iter()
        .map(|(text, _)| text)
        .collect();
    if !bytes.is_empty() {
        lines.push(decode_line(&bytes));
    }
    Ok(lines)
}

// =============================================================================
// Line splitting
// =============================================================================

/// Remove every newline-terminated line from the front of `buf`, returning
/// each decoded line with the byte length it consumed (terminator included).
/// Whatever follows the final newline stays in `buf`.
fn split_complete_lines(buf: &mut Vec<u8>) -> Vec<(String, usize)> {
    let Some(last_nl) = buf.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };
    let rest = buf.split_off(last_nl + 1);
    let complete = std::mem::replace(buf, rest);

    complete
        .split_inclusive(|&b| b == b'\n')
        .map(|chunk| (decode_line(chunk), chunk.len()))
        .collect()
}

/// Decode one line, dropping its `\n` or `\r\n` terminator.
fn decode_line(chunk: &[u8]) -> String {
    let mut end = chunk.len();
    if end > 0 && chunk[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && chunk[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&chunk[..end]).into_owned()
}

// =============================================================================
// Background tail watcher
// =============================================================================

/// Identity of the file instance `meta` describes.
pub fn file_identity(meta: &Metadata) -> FileIdentity {
    #[cfg(unix)]
    let (dev, ino) = {
        use std::os::unix::fs::MetadataExt;
        (meta.dev(), meta.ino())
    };
    #[cfg(not(unix))]
    let (dev, ino) = (0, 0);
    FileIdentity {
        dev,
        ino,
        created: meta.created().ok(),
    }
}

/// Per-session file state (private to the background thread).
struct FileState {
    path: PathBuf,
    /// Instance being read; `None` before the first read and after the path
    /// failed to stat.
    identity: Option<FileIdentity>,
    /// Byte position of the next unread byte.
    offset: u64,
    /// Bytes read after the last newline: an in-progress line.
    partial: Vec<u8>,
    /// Reading restarted at 0 and the owner has not been told yet.
    announce: bool,
}

/// Result of one poll tick.
#[derive(Debug, Default)]
struct PollOutcome {
    /// Set when reading restarted at offset 0 of this instance.
    opened: Option<FileIdentity>,
    /// Complete lines with the offset just past each.
    lines: Vec<(String, u64)>,
}

impl FileState {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            identity: None,
            offset: 0,
            partial: Vec::new(),
            announce: false,
        }
    }

    fn rewind(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.announce = true;
    }

    /// The instance to announce, once per rewind.
    fn take_announcement(&mut self) -> Option<FileIdentity> {
        if std::mem::take(&mut self.announce) {
            self.identity
        } else {
            None
        }
    }

    /// Offset just past the last complete line handed out.
    fn committed(&self) -> u64 {
        self.offset - self.partial.len() as u64
    }
}

/// Background poll loop. Reads everything already in the file, then checks
/// for appended content every `interval` until cancelled.
fn run_tail_watcher(
    session: SessionId,
    path: PathBuf,
    interval: Duration,
    tx: mpsc::Sender<TailEvent>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Owner dropped; exit silently.
                return;
            }
        };
    }

    let mut state = FileState::new(path.clone());
    let mut failing = false;

    send!(TailEvent::Started { session, path });

    let slice = Duration::from_millis(TAIL_CANCEL_CHECK_INTERVAL_MS).min(interval);
    let slices = (interval.as_millis() / slice.as_millis().max(1)).max(1);

    loop {
        if cancel.load(Ordering::SeqCst) {
            send!(TailEvent::Stopped { session });
            return;
        }

        match poll_file(&mut state) {
            Ok(outcome) => {
                if failing {
                    tracing::info!(session = %session, "Tail: reads recovered");
                    failing = false;
                }
                if let Some(identity) = outcome.opened {
                    send!(TailEvent::Opened { session, identity });
                }
                for (text, end_offset) in outcome.lines {
                    if cancel.load(Ordering::SeqCst) {
                        send!(TailEvent::Stopped { session });
                        return;
                    }
                    send!(TailEvent::Line {
                        session,
                        text,
                        end_offset,
                    });
                }
            }
            Err(error) if failing => {
                tracing::debug!(session = %session, error = %error, "Tail: read error persists");
            }
            Err(error) => {
                tracing::warn!(session = %session, error = %error, "Tail: read error");
                failing = true;
                send!(TailEvent::Failed { session, error });
            }
        }

        // Interruptible sleep: check cancel flag between slices.
        for _ in 0..slices {
            std::thread::sleep(slice);
            if cancel.load(Ordering::SeqCst) {
                send!(TailEvent::Stopped { session });
                return;
            }
        }
    }
}

/// One poll tick: read new bytes and return the complete lines they finish,
/// each paired with the file offset just past it.
fn poll_file(state: &mut FileState) -> Result<PollOutcome, TailError> {
    // 1. Stat. A path that cannot be stat'ed loses its identity, so whatever
    //    appears there next is read from the start.
    let meta = match std::fs::metadata(&state.path) {
        Ok(meta) => meta,
        Err(e) => {
            state.identity = None;
            return Err(TailError::Read {
                path: state.path.clone(),
                operation: "stat",
                source: e,
            });
        }
    };
    let current_size = meta.len();
    let identity = file_identity(&meta);
    let mut outcome = PollOutcome::default();

    // 2. Handle a new file instance, then truncation.
    if state.identity != Some(identity) {
        if state.identity.is_some() || state.offset > 0 {
            tracing::info!(
                file = %state.path.display(),
                old_offset = state.offset,
                "Tail: file replaced, reading from offset 0"
            );
        }
        state.rewind();
        state.identity = Some(identity);
    } else if current_size < state.offset {
        tracing::info!(
            file = %state.path.display(),
            old_offset = state.offset,
            new_size = current_size,
            "Tail: file truncated, resetting offset to 0"
        );
        state.rewind();
    }

    // 3. Nothing new.
    if current_size <= state.offset {
        outcome.opened = state.take_announcement();
        return Ok(outcome);
    }

    // 4. Read new bytes (capped per tick).
    let available = usize::try_from(current_size - state.offset).unwrap_or(usize::MAX);
    let limit = available.min(MAX_TAIL_READ_BYTES_PER_TICK);
    let new_bytes =
        read_bytes_at(&state.path, state.offset, limit).map_err(|e| TailError::Read {
            path: state.path.clone(),
            operation: "read",
            source: e,
        })?;
    outcome.opened = state.take_announcement();
    if new_bytes.is_empty() {
        return Ok(outcome);
    }
    state.offset += new_bytes.len() as u64;
    state.partial.extend_from_slice(&new_bytes);

    // 5. Split off complete lines; keep the in-progress tail.
    let mut position = state.committed();
    for (text, consumed) in split_complete_lines(&mut state.partial) {
        position += consumed as u64;
        outcome.lines.push((text, position));
    }

    // 6. An unbounded fragment is flushed as a line of its own.
    if state.partial.len() > MAX_TAIL_PARTIAL_BYTES {
        tracing::warn!(
            file = %state.path.display(),
            bytes = state.partial.len(),
            "Tail: line exceeds partial buffer limit, flushing without terminator"
        );
        let fragment = std::mem::take(&mut state.partial);
        outcome.lines.push((decode_line(&fragment), state.offset));
    }

    if !outcome.lines.is_empty() {
        tracing::debug!(
            file = %state.path.display(),
            count = outcome.lines.len(),
            "Tail: new lines"
        );
    }
    Ok(outcome)
}

/// Read up to `limit` bytes from `path` starting at byte position `offset`.
fn read_bytes_at(path: &Path, offset: u64, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(limit);
    file.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
