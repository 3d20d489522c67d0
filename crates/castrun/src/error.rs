//! # Error Definitions
//!
//! Recoverable failures are returned as `Error`. Conditions the process cannot
//! continue from (resource creation, registry exhaustion, multiplexer failure)
//! go through `fatal`, which logs, prints a diagnostic and exits with status 255.

use crate::transport;

/// Errors returned by context operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The outbound buffer has no room for the call; process events and retry.
    Busy,
    /// No event arrived before the caller's deadline.
    Timeout,
    /// The context lock could not be acquired before the deadline.
    LockTimeout,
    /// The caller supplied an unusable name, reference or argument list.
    InvalidArgument(String),
    /// `setup` was called on an already initialized context.
    AlreadyInitialized,
    /// A fixed-size registry is full.
    CapacityExhausted { table: &'static str, capacity: usize },
    /// A frame or control message failed to encode or decode.
    Wire(castwire::Error),
    /// The transport reported a failure.
    Transport(transport::Error),
    /// An operating system call failed.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "Outbound buffer full"),
            Self::Timeout => write!(f, "Timed out waiting for events"),
            Self::LockTimeout => write!(f, "Timed out acquiring the context lock"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::AlreadyInitialized => write!(f, "Context already initialized"),
            Self::CapacityExhausted { table, capacity } => {
                write!(f, "Table {} is full ({} entries)", table, capacity)
            }
            Self::Wire(e) => write!(f, "Wire error: {}", e),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<castwire::Error> for Error {
    fn from(e: castwire::Error) -> Self {
        Self::Wire(e)
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit status used for unrecoverable conditions.
pub const FATAL_EXIT_CODE: i32 = 255;

/// Logs an unrecoverable condition naming `resource` and terminates the process.
pub fn fatal(resource: &str, detail: impl std::fmt::Display) -> ! {
    tracing::error!(resource, %detail, "fatal");
    eprintln!("castrun: fatal: {}: {}", resource, detail);
    std::process::exit(FATAL_EXIT_CODE)
}
