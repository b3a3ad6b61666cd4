use thiserror::Error;

/// Source location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors that can occur while configuring parsers or rendering Markdown.
#[derive(Debug, Error)]
pub enum MarkdownError {
    /// A callback crossed a trust boundary without being declared trusted.
    #[error("Untrusted callback: {message}")]
    UntrustedCallback {
        /// Message with the resolved callback substituted in
        message: String,
        /// Resolved `Type::method` description
        callback: String,
    },
    /// A `Type::method` callback path named a type the gate does not know.
    #[error("Unknown callback target: {0}")]
    UnknownCallback(String),
    /// Extension id not present in the parser's bundle.
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),
    /// Two extensions in one bundle share an id.
    #[error("Duplicate extension: {0}")]
    DuplicateExtension(String),
    /// Error surfaced unchanged from the backend conversion engine.
    #[error("Backend conversion error at {location}: {message}")]
    Backend {
        /// Error message
        message: String,
        /// Source location
        location: SourceLocation,
    },
    /// HTML rewriting (input stripping, link rewriting) failed.
    #[error("HTML rewrite error: {0}")]
    Rewrite(String),
    /// An allowed-HTML declaration could not be parsed.
    #[error("Invalid allowed HTML near '{near}': {message}")]
    InvalidAllowlist {
        /// Error message
        message: String,
        /// Fragment of the declaration around the failure
        near: String,
    },
    /// Configuration could not be read, written or decoded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarkdownError {
    /// Create a backend conversion error with location
    pub fn backend(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Backend {
            message: message.into(),
            location: SourceLocation::new(line, column),
        }
    }

    /// Create an allowlist parse error
    pub fn invalid_allowlist(message: impl Into<String>, near: impl Into<String>) -> Self {
        Self::InvalidAllowlist {
            message: message.into(),
            near: near.into(),
        }
    }

    /// Create a configuration error from any displayable cause
    pub fn config(cause: impl std::fmt::Display) -> Self {
        Self::Config(cause.to_string())
    }
}
