//! Error types for showdeck-mc
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.
//!
//! Backend faults deserve their own variant: the engine's recovery logic
//! matches on `BackendFault` to decide whether a failed call should replace
//! the decoder or simply be reported.

use thiserror::Error;

/// Main error type for showdeck-mc
#[derive(Error, Debug)]
pub enum Error {
    /// Native decoding backend could not be located or loaded
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A previously working decoder raised during a call (core shutdown,
    /// broken handle). Triggers decoder replacement.
    #[error("Backend fault: {0}")]
    BackendFault(String),

    /// Caller-supplied input was rejected (e.g. nonexistent media path).
    /// The decoder is not at fault; no recovery is attempted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using showdeck-mc Error
pub type Result<T> = std::result::Result<T, Error>;
