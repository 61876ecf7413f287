// LogTab - core/summary.rs
//
// Status-derived summary for the host's banner area. Independent of the
// tail watcher: an error summary is available even when no log file is.

use crate::core::model::{JobStatus, StatusSummary};
use crate::util::constants::{COMPLETE_MESSAGE, ERROR_SUMMARY_PLACEHOLDER};

/// The last non-blank line of a run's stderr, or the placeholder when there
/// is none.
///
/// Trailing empty and whitespace-only segments are skipped, so text ending
/// in a newline yields the line before it. The line itself is returned as
/// written, minus its terminator. Text with no visible content at all is
/// treated the same as missing text.
pub fn last_error_line(stderr: Option<&str>) -> String {
    stderr
        .unwrap_or_default()
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ERROR_SUMMARY_PLACEHOLDER.to_string())
}

/// Summary for `status`. `stderr` is only consulted for `JobStatus::Error`.
pub fn summarize(status: JobStatus, stderr: Option<&str>) -> StatusSummary {
    match status {
        JobStatus::NotStarted => StatusSummary::None,
        JobStatus::Running => StatusSummary::Running { can_cancel: true },
        JobStatus::Error => StatusSummary::Failed {
            last_line: last_error_line(stderr),
        },
        JobStatus::Success => StatusSummary::Complete {
            message: COMPLETE_MESSAGE.to_string(),
        },
        JobStatus::Canceled => StatusSummary::Canceled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_of_traceback() {
        let stderr = "Traceback...\nValueError: bad input\n";
        assert_eq!(last_error_line(Some(stderr)), "ValueError: bad input");
    }

    #[test]
    fn test_skips_trailing_blank_segments() {
        let stderr = "first\nKeyError: 'lulc'\n\n   \n\t\n";
        assert_eq!(last_error_line(Some(stderr)), "KeyError: 'lulc'");
    }

    #[test]
    fn test_crlf_line_endings() {
        let stderr = "Traceback\r\nOSError: disk full\r\n";
        assert_eq!(last_error_line(Some(stderr)), "OSError: disk full");
    }

    #[test]
    fn test_line_is_returned_as_written() {
        let stderr = "Traceback\n    raise ValueError('x')  \n";
        assert_eq!(
            last_error_line(Some(stderr)),
            "    raise ValueError('x')  "
        );
    }

    #[test]
    fn test_empty_uses_placeholder() {
        assert_eq!(last_error_line(Some("")), ERROR_SUMMARY_PLACEHOLDER);
        assert_eq!(last_error_line(None), ERROR_SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn test_all_blank_uses_placeholder() {
        assert_eq!(last_error_line(Some("\n \n\t\n\n")), ERROR_SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn test_summaries_per_status() {
        assert_eq!(summarize(JobStatus::NotStarted, None), StatusSummary::None);
        assert_eq!(
            summarize(JobStatus::Running, Some("ignored")),
            StatusSummary::Running { can_cancel: true }
        );
        assert_eq!(
            summarize(JobStatus::Error, Some("")),
            StatusSummary::Failed {
                last_line: "Error (see Log for details)".to_string()
            }
        );
        assert_eq!(
            summarize(JobStatus::Success, Some("noise\n")),
            StatusSummary::Complete {
                message: "Model Complete".to_string()
            }
        );
        assert_eq!(summarize(JobStatus::Canceled, None), StatusSummary::Canceled);
    }
}
