//! Common trait for pipeline stage errors.

/// Common trait for errors raised by pipeline stages.
///
/// This trait provides a unified interface for error reporting across the
/// extraction, render, cache, display, and conversion stages. Each stage
/// error type implements it to enable:
/// - Stable error codes for host-side handling
/// - Human-readable messages for users
/// - Grouping of related errors by category
pub trait StageError: std::error::Error {
    /// Get the error code for reporting.
    ///
    /// Returns a static string like "EXTRACT_001", "RENDER_002", etc.
    /// These codes are stable and can be used for programmatic handling.
    fn code(&self) -> &'static str;

    /// Get the error category for grouping related errors.
    ///
    /// Returns a category like "extract", "render", "cache", "display".
    fn category(&self) -> &'static str;

    /// Get a human-readable message describing the error.
    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;

    #[test]
    fn test_stage_error_message_matches_display() {
        let err = ExtractError::NoCodeBlock;
        assert_eq!(err.message(), err.to_string());
    }
}
