//! Optolink Error Types
//!
//! Link faults, protocol faults and configuration faults. Decode faults are
//! not errors: the codec reports them as [`crate::Value::Invalid`].

use thiserror::Error;

/// Result type for optolink operations
pub type Result<T> = std::result::Result<T, OptolinkError>;

/// Optolink errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptolinkError {
    /// Command table or link parameters are unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// The serial device could not be opened or exclusively acquired
    #[error("Connection error: {0}")]
    Connection(String),

    /// Hard I/O fault on an open link (device unplugged, port closed)
    #[error("IO error: {0}")]
    Io(String),

    /// An operation did not complete within its window
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Fewer bytes than requested arrived before the read timeout
    #[error("Short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// The device answered a write with a non-zero status byte
    #[error("Write rejected with status 0x{0:02X}")]
    WriteRejected(u8),

    /// Unexpected or malformed response
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl OptolinkError {
    pub fn config(msg: impl Into<String>) -> Self {
        OptolinkError::Config(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        OptolinkError::Io(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        OptolinkError::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        OptolinkError::Protocol(msg.into())
    }

    /// Fatal faults must end the poll loop; everything else is local to a
    /// single command or cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OptolinkError::Connection(_) | OptolinkError::Io(_))
    }
}

impl From<std::io::Error> for OptolinkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                OptolinkError::Timeout(err.to_string())
            },
            _ => OptolinkError::Io(err.to_string()),
        }
    }
}
