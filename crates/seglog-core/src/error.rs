//! Error types for seglog.

use std::fmt;

/// The main error type for seglog operations.
#[derive(Debug)]
pub enum Error {
    /// A lock was poisoned (internal error)
    LockPoisoned,

    /// I/O error
    Io(std::io::Error),

    /// A frame's bytes are inconsistent with its declared length, or its
    /// body does not deserialize
    MalformedFrame(String),

    /// A frame's stored checksum does not match the recomputed value
    ChecksumMismatch {
        /// Checksum stored in the frame
        expected: u32,
        /// Checksum recomputed over the frame contents
        actual: u32,
    },

    /// The log directory contains a file that is not a valid segment
    DirectoryCorrupt(String),

    /// Operation attempted on a closed log
    Closed,

    /// Flushing buffered data (or forcing it to stable storage) failed
    Sync(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            Error::ChecksumMismatch { expected, actual } => write!(
                f,
                "Checksum mismatch: expected {:#010x}, got {:#010x}",
                expected, actual
            ),
            Error::DirectoryCorrupt(msg) => write!(f, "Directory corrupt: {}", msg),
            Error::Closed => write!(f, "Log is closed"),
            Error::Sync(msg) => write!(f, "Sync failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A specialized `Result` type for seglog operations.
pub type Result<T> = std::result::Result<T, Error>;
