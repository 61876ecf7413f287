// LogTab - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTab";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTab";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Live tail limits
// =============================================================================

/// How often the tail watcher polls the watched file for new content (ms).
pub const TAIL_POLL_INTERVAL_MS: u64 = 500;

/// How often the cancel flag is checked within each poll sleep interval (ms).
/// The background thread wakes every this many ms to check for cancellation.
pub const TAIL_CANCEL_CHECK_INTERVAL_MS: u64 = 20;

/// Minimum user-configurable tail poll interval (ms).
pub const MIN_TAIL_POLL_INTERVAL_MS: u64 = 100;

/// Maximum user-configurable tail poll interval (ms).
pub const MAX_TAIL_POLL_INTERVAL_MS: u64 = 10_000; // 10 s

/// Maximum bytes read from the watched file in one poll tick.
/// Prevents a large burst of new content from stalling the poll loop.
pub const MAX_TAIL_READ_BYTES_PER_TICK: usize = 512 * 1_024; // 512 KiB

/// Maximum accumulated size of the partial (in-progress) line buffer.
///
/// A file that produces no newlines (binary content, one enormous line) would
/// otherwise grow the fragment without bound. Past this size the fragment is
/// flushed as a line of its own.
pub const MAX_TAIL_PARTIAL_BYTES: usize = MAX_TAIL_READ_BYTES_PER_TICK * 4; // 2 MiB

/// Maximum number of tail events applied by the coordinator per pump.
/// Remaining events stay queued for the next pump so a burst of writes
/// cannot stall the host's update loop.
pub const MAX_TAIL_EVENTS_PER_PUMP: usize = 2_000;

// =============================================================================
// Classification
// =============================================================================

/// Class label for error output (tracebacks, `*Error` tokens, indented lines).
pub const ERROR_LABEL: &str = "log-error";

/// Class label for lines emitted by the job's primary logger.
pub const PRIMARY_LABEL: &str = "log-primary";

/// Prefix every job log line starts with, e.g. `2020-10-16 07:13:04,325`.
pub const LOG_TIMESTAMP_PATTERN: &str =
    r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2},[0-9]{3}";

/// chrono format matching `LOG_TIMESTAMP_PATTERN`.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Byte length of a `LOG_TIMESTAMP_FORMAT` timestamp.
pub const LOG_TIMESTAMP_LEN: usize = 23;

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of user-defined patterns accepted from config.toml.
pub const MAX_USER_PATTERNS: usize = 32;

// =============================================================================
// Display
// =============================================================================

/// The only element allowed in rendered log markup.
pub const LOG_TEXT_TAG: &str = "span";

/// The only attribute allowed on `LOG_TEXT_TAG`.
pub const LOG_TEXT_ATTRIBUTE: &str = "class";

/// Buffer content shown when the log file does not exist. The path follows.
pub const MISSING_LOGFILE_MESSAGE: &str = "Logfile is missing: ";

/// Error summary used when no stderr text is available (e.g. a recent run
/// re-loaded after restart, whose stderr was never captured).
pub const ERROR_SUMMARY_PLACEHOLDER: &str = "Error (see Log for details)";

/// Banner text for a successfully completed run.
pub const COMPLETE_MESSAGE: &str = "Model Complete";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
