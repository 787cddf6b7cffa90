//! Parse error types for the iCalendar subset.

use std::fmt;

/// Result type for content-line parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// An error from lexing one content line.
///
/// The scanner recovers by skipping the offending line, so these never
/// escape a full document parse.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Line number where the error occurred (1-based).
    pub line: usize,
    /// Additional context or message.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(kind: ParseErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.message)
    }
}

impl std::error::Error for ParseError {}

/// The kind of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    /// Line has no `:` separating name from value.
    #[error("missing ':' separator")]
    MissingColon,
    /// Line starts with `;` or `:`.
    #[error("missing property name")]
    MissingPropertyName,
    /// Property name contains characters outside `[A-Za-z0-9-]`.
    #[error("invalid property name")]
    InvalidPropertyName,
    /// Parameter is malformed (no `=`, empty name).
    #[error("invalid parameter")]
    InvalidParameter,
    /// Quoted parameter value never closes.
    #[error("unclosed quote")]
    UnclosedQuote,
}
