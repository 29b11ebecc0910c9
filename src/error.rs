//! Error handling for get-cookies

use thiserror::Error;

/// Main error type for cookie loading and export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Browser cookie error: {0}")]
    BrowserCookie(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ExportError {
    /// Whether a browser failing with this error should simply be skipped.
    ///
    /// Missing or unsupported browsers are normal when scanning every
    /// known store; permission and I/O failures are not.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ExportError::BrowserCookie(_)
                | ExportError::Config(_)
                | ExportError::FileNotFound(_)
                | ExportError::Unsupported(_)
        )
    }
}

/// Result type alias for get-cookies operations
pub type Result<T> = std::result::Result<T, ExportError>;
