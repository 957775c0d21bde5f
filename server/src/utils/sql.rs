//! SQL utility functions

/// Escape LIKE metacharacters (%, _, \) in user input
///
/// ClickHouse treats backslash as the LIKE escape character, so the escaped
/// value matches literally when wrapped in `%...%`.
///
/// # Example
///
/// ```
/// use cohortql_server::utils::sql::escape_like_pattern;
///
/// let user_input = "100% match_test";
/// let pattern = format!("%{}%", escape_like_pattern(user_input));
/// assert_eq!(pattern, "%100\\% match\\_test%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Build a substring LIKE pattern (`%value%`) from raw user input
pub fn contains_pattern(s: &str) -> String {
    format!("%{}%", escape_like_pattern(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_pattern_plain() {
        assert_eq!(escape_like_pattern("signup"), "signup");
    }

    #[test]
    fn test_escape_like_pattern_percent_and_underscore() {
        assert_eq!(escape_like_pattern("50%_off"), "50\\%\\_off");
    }

    #[test]
    fn test_escape_like_pattern_backslash_first() {
        assert_eq!(escape_like_pattern("a\\%"), "a\\\\\\%");
    }

    #[test]
    fn test_contains_pattern() {
        assert_eq!(contains_pattern("pro_plan"), "%pro\\_plan%");
        assert_eq!(contains_pattern(""), "%%");
    }
}
