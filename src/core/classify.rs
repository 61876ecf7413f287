// LogTab - core/classify.rs
//
// Line classification: an ordered list of (label, regex) pairs evaluated
// until the first match. Order is priority, so the error pattern sits ahead
// of the primary-logger pattern: an error raised by the primary module must
// still render as an error.
//
// Core layer: pure logic, no I/O.

use crate::core::model::ClassifiedLine;
use crate::util::constants::{
    ERROR_LABEL, LOG_TIMESTAMP_FORMAT, LOG_TIMESTAMP_LEN, LOG_TIMESTAMP_PATTERN,
    MAX_REGEX_PATTERN_LENGTH, PRIMARY_LABEL,
};
use crate::util::error::PatternError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

/// Tracebacks, capitalised `<Word>Error` tokens, the literal `ERROR`, and
/// lines starting with whitespace (indented traceback frames).
const ERROR_PATTERN: &str = r"(Traceback)|(^\s*[A-Z][a-z]*Error)|(ERROR)|(^\s+)";

/// A named pattern. The label becomes the `class` of the rendered line.
#[derive(Debug, Clone)]
pub struct LogPattern {
    label: String,
    matcher: Regex,
}

impl LogPattern {
    /// Compile `pattern` under `label`.
    pub fn new(label: &str, pattern: &str) -> Result<Self, PatternError> {
        if !is_valid_label(label) {
            return Err(PatternError::InvalidLabel {
                label: label.to_string(),
            });
        }
        if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
            return Err(PatternError::RegexTooLong {
                label: label.to_string(),
                length: pattern.len(),
                max_length: MAX_REGEX_PATTERN_LENGTH,
            });
        }
        let matcher = Regex::new(pattern).map_err(|e| PatternError::InvalidRegex {
            label: label.to_string(),
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self {
            label: label.to_string(),
            matcher,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.matcher.is_match(line)
    }
}

/// Labels are emitted verbatim as a class attribute value, so they are
/// restricted to a conservative class-name alphabet.
fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Return the label of the first pattern matching `line`.
///
/// Empty input never matches.
pub fn classify<'a>(line: &str, patterns: &'a [LogPattern]) -> Option<&'a str> {
    if line.is_empty() {
        return None;
    }
    patterns
        .iter()
        .find(|p| p.is_match(line))
        .map(LogPattern::label)
}

/// The logger name a dotted module writes under: its last component.
///
/// `natcap.invest.carbon` logs as `carbon`.
pub fn primary_logger(module_name: &str) -> &str {
    module_name.rsplit('.').next().unwrap_or(module_name)
}

/// Parse the `YYYY-MM-DD HH:MM:SS,mmm` prefix of a job log line.
pub fn parse_line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let prefix = line.get(..LOG_TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(prefix, LOG_TIMESTAMP_FORMAT).ok()
}

/// Ordered pattern list. Index order is evaluation order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<LogPattern>,
}

impl PatternSet {
    /// An empty set; every line renders plain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set for a job whose primary module is `module_name`:
    /// the error pattern, then the primary-logger pattern.
    pub fn for_module(module_name: &str) -> Self {
        let mut set = Self::new();
        set.patterns.push(error_pattern());
        let logger = primary_logger(module_name);
        if !logger.is_empty() {
            set.patterns.push(primary_pattern(logger));
        }
        tracing::debug!(
            module = module_name,
            logger,
            patterns = set.patterns.len(),
            "Built classification patterns"
        );
        set
    }

    /// Append a pattern at the lowest priority.
    pub fn push(&mut self, pattern: LogPattern) {
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[LogPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Label of the first matching pattern.
    pub fn classify(&self, line: &str) -> Option<&str> {
        classify(line, &self.patterns)
    }

    /// Classify `line` into an owned record.
    pub fn classify_line(&self, line: &str) -> ClassifiedLine {
        ClassifiedLine {
            raw_text: line.to_string(),
            label: self.classify(line).map(str::to_string),
            timestamp: parse_line_timestamp(line),
        }
    }
}

fn error_pattern() -> LogPattern {
    static ERROR_RE: OnceLock<Regex> = OnceLock::new();
    let matcher = ERROR_RE
        .get_or_init(|| Regex::new(ERROR_PATTERN).expect("ERROR_PATTERN: invalid regex"))
        .clone();
    LogPattern {
        label: ERROR_LABEL.to_string(),
        matcher,
    }
}

fn primary_pattern(logger: &str) -> LogPattern {
    // The logger name is escaped, so this compiles for any input.
    let source = format!("{LOG_TIMESTAMP_PATTERN} {}", regex::escape(logger));
    LogPattern {
        label: PRIMARY_LABEL.to_string(),
        matcher: Regex::new(&source).expect("primary pattern: invalid regex"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbon() -> PatternSet {
        PatternSet::for_module("natcap.invest.carbon")
    }

    #[test]
    fn test_primary_logger_is_last_component() {
        assert_eq!(primary_logger("natcap.invest.carbon"), "carbon");
        assert_eq!(primary_logger("carbon"), "carbon");
        assert_eq!(primary_logger(""), "");
    }

    #[test]
    fn test_primary_line() {
        let set = carbon();
        assert_eq!(
            set.classify("2020-10-16 07:13:04,325 carbon.execute() starting"),
            Some(PRIMARY_LABEL)
        );
    }

    #[test]
    fn test_other_logger_is_plain() {
        let set = carbon();
        assert_eq!(
            set.classify("2020-10-16 07:13:04,325 natcap.invest.utils reading raster"),
            None
        );
    }

    #[test]
    fn test_error_beats_primary() {
        let set = carbon();
        let line = "2020-10-16 07:13:04,325 carbon ERROR could not open raster";
        assert_eq!(set.classify(line), Some(ERROR_LABEL));
    }

    #[test]
    fn test_error_forms() {
        let set = carbon();
        for line in [
            "Traceback (most recent call last):",
            "ValueError: bad input",
            "  File \"carbon.py\", line 12, in execute",
            "\tat frame",
            "2020-10-16 07:13:04,325 utils ERROR disk full",
        ] {
            assert_eq!(set.classify(line), Some(ERROR_LABEL), "line: {line:?}");
        }
    }

    #[test]
    fn test_lowercase_error_word_is_plain() {
        let set = carbon();
        assert_eq!(set.classify("no errors found"), None);
    }

    #[test]
    fn test_empty_line_never_matches() {
        let mut set = carbon();
        set.push(LogPattern::new("anything", ".*").unwrap());
        assert_eq!(set.classify(""), None);
    }

    #[test]
    fn test_user_pattern_after_builtins() {
        let mut set = carbon();
        set.push(LogPattern::new("log-warning", "WARNING").unwrap());
        assert_eq!(
            set.classify("2020-10-16 07:13:04,325 utils WARNING nodata"),
            Some("log-warning")
        );
        // Primary still wins over a later user pattern.
        assert_eq!(
            set.classify("2020-10-16 07:13:04,325 carbon WARNING nodata"),
            Some(PRIMARY_LABEL)
        );
    }

    #[test]
    fn test_logger_name_is_escaped() {
        let set = PatternSet::for_module("pkg.a+b");
        assert_eq!(
            set.classify("2020-10-16 07:13:04,325 a+b started"),
            Some(PRIMARY_LABEL)
        );
        assert_eq!(set.classify("2020-10-16 07:13:04,325 aab started"), None);
    }

    #[test]
    fn test_invalid_label_rejected() {
        for label in ["", "1abc", "-x", "a b", "a\"b", "a>b"] {
            assert!(
                matches!(
                    LogPattern::new(label, "x"),
                    Err(PatternError::InvalidLabel { .. })
                ),
                "label {label:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(matches!(
            LogPattern::new("bad", "[unclosed"),
            Err(PatternError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_long_regex_rejected() {
        let long = "a".repeat(MAX_REGEX_PATTERN_LENGTH + 1);
        assert!(matches!(
            LogPattern::new("long", &long),
            Err(PatternError::RegexTooLong { .. })
        ));
    }

    #[test]
    fn test_classify_line_parses_timestamp() {
        let line = carbon().classify_line("2020-10-16 07:13:04,325 carbon done");
        assert_eq!(line.label.as_deref(), Some(PRIMARY_LABEL));
        let ts = line.timestamp.expect("timestamp");
        assert_eq!(ts.format("%H:%M:%S%.3f").to_string(), "07:13:04.325");

        let plain = carbon().classify_line("no timestamp here");
        assert!(plain.timestamp.is_none());
        assert!(plain.label.is_none());
    }
}
