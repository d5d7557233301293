//! Error handling for the iqsplit library
//!
//! A single error type covers every fallible operation of the pipeline. Link
//! failures (connect refused, read/write errors, EOF) surface as [`Error::Io`]
//! and are recovered by the owning link; only [`Error::Config`] and
//! [`Error::Allocation`] are meant to end the process.

use std::io;

use thiserror::Error;

/// A specialized Result type for iqsplit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for iqsplit operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on one of the sockets
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed frame on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Ring buffer storage could not be reserved
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

// Helper constructors for common error scenarios

impl Error {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a protocol error with a custom message
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a generic error with a custom message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether the process should stop instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Allocation(_))
    }
}
