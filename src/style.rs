//! Terminal styling utilities
//!
//! Uses crossterm for cross-platform terminal colors.

use crossterm::style::{StyledContent, Stylize};

/// Section headers
pub fn header(text: &str) -> StyledContent<String> {
    text.to_string().bold()
}

/// Repository names in sync progress
pub fn repo(full_name: &str) -> StyledContent<String> {
    full_name.to_string().cyan().bold()
}

/// Counts; zero is dimmed
pub fn count(n: u64) -> StyledContent<String> {
    if n == 0 {
        n.to_string().dark_grey()
    } else {
        n.to_string().green()
    }
}

/// Dim/muted text
pub fn dim(text: &str) -> StyledContent<String> {
    text.to_string().dark_grey()
}

pub fn success(text: &str) -> StyledContent<String> {
    text.to_string().green()
}

pub fn warning(text: &str) -> StyledContent<String> {
    text.to_string().yellow()
}

pub fn error(text: &str) -> StyledContent<String> {
    text.to_string().red()
}

/// Paths and addresses
pub fn path(p: &str) -> StyledContent<String> {
    p.to_string().blue()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_styles() {
        assert_eq!(count(0).content(), "0");
        assert_eq!(count(12).content(), "12");
    }

    #[test]
    fn test_text_is_preserved() {
        assert_eq!(repo("acme/widgets").content(), "acme/widgets");
        assert_eq!(dim("quiet").content(), "quiet");
        assert_eq!(error("Error:").content(), "Error:");
    }
}
