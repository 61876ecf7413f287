// LogTab - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.
//
// Only filesystem conditions and user configuration are fallible.
// Classification and sanitization are total functions over strings and
// have no error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogTab operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTabError {
    /// Tailing the job log failed.
    Tail(TailError),

    /// A classification pattern was rejected.
    Pattern(PatternError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LogTabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Pattern(e) => write!(f, "Pattern error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LogTabError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tail(e) => Some(e),
            Self::Pattern(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Errors raised while watching a log file.
#[derive(Debug)]
pub enum TailError {
    /// The log file does not exist when the watch starts. Reported
    /// synchronously by `TailManager::start_tail`; never retried.
    MissingFile { path: PathBuf },

    /// An I/O failure on an already-running watch. Delivered asynchronously
    /// as a `TailEvent::Failed`; the session stays active.
    Read {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl TailError {
    /// Path of the file the error concerns.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::MissingFile { path } | Self::Read { path, .. } => path,
        }
    }

    /// True for the synchronous missing-file condition.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::MissingFile { .. })
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { path } => {
                write!(f, "Log file '{}' does not exist", path.display())
            }
            Self::Read {
                path,
                operation,
                source,
            } => write!(
                f,
                "Cannot {operation} log file '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::MissingFile { .. } => None,
        }
    }
}

impl From<TailError> for LogTabError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

/// Errors related to building classification patterns.
#[derive(Debug)]
pub enum PatternError {
    /// The label is empty or not usable as a class attribute token.
    InvalidLabel { label: String },

    /// The regex pattern does not compile.
    InvalidRegex {
        label: String,
        pattern: String,
        source: regex::Error,
    },

    /// The regex pattern exceeds the maximum allowed length.
    RegexTooLong {
        label: String,
        length: usize,
        max_length: usize,
    },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLabel { label } => write!(
                f,
                "Label '{label}' is not a valid class name \
                 (letters, digits, '-' and '_', not starting with a digit or '-')"
            ),
            Self::InvalidRegex {
                label,
                pattern,
                source,
            } => write!(
                f,
                "Pattern '{label}': invalid regex ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                label,
                length,
                max_length,
            } => write!(
                f,
                "Pattern '{label}': regex is {length} chars, exceeds maximum of {max_length}"
            ),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PatternError> for LogTabError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogTabError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogTab results.
pub type Result<T> = std::result::Result<T, LogTabError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_read_error_preserves_source_chain() {
        let err = LogTabError::from(TailError::Read {
            path: PathBuf::from("run.log"),
            operation: "read",
            source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        });
        let tail = err.source().expect("tail source");
        let io = tail.source().expect("io source");
        assert_eq!(io.to_string(), "locked");
        assert!(err.to_string().contains("run.log"));
    }

    #[test]
    fn test_missing_file_has_no_source() {
        let err = TailError::MissingFile {
            path: PathBuf::from("/no/such/file.log"),
        };
        assert!(err.is_missing_file());
        assert!(err.source().is_none());
        assert_eq!(err.path(), std::path::Path::new("/no/such/file.log"));
    }
}
