// LogTab - ui/theme.rs
//
// Terminal styling for classification labels.
// No dependencies on app state or business logic.

use crate::util::constants;

/// Clears all SGR attributes.
pub const RESET: &str = "\x1b[0m";

/// Clear screen and home the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Bold red, for error lines.
pub const ERROR_STYLE: &str = "\x1b[1;31m";

/// Bold, for the primary module's own lines.
pub const PRIMARY_STYLE: &str = "\x1b[1m";

/// Cyan, for user-defined labels.
pub const OTHER_STYLE: &str = "\x1b[36m";

/// SGR sequence for a classification label.
pub fn label_style(label: &str) -> &'static str {
    match label {
        constants::ERROR_LABEL => ERROR_STYLE,
        constants::PRIMARY_LABEL => PRIMARY_STYLE,
        _ => OTHER_STYLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_labels_have_distinct_styles() {
        assert_eq!(label_style("log-error"), ERROR_STYLE);
        assert_eq!(label_style("log-primary"), PRIMARY_STYLE);
        assert_eq!(label_style("log-warning"), OTHER_STYLE);
        assert_ne!(ERROR_STYLE, PRIMARY_STYLE);
    }
}
