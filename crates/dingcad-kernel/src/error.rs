//! Error types for the kernel
//!
//! Geometry validity is never reported through these; see [`crate::Status`].

use thiserror::Error;

/// Result type alias using the kernel's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by kernel I/O and parameter checks
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh import failed to parse the file
    #[error("Import failed: {0}")]
    Import(String),

    /// File extension is not a supported mesh format
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// Export failed
    #[error("Export failed: {0}")]
    Export(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
