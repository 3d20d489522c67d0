//! # Error Definitions
//!
//! Every way a frame, control message or argument list can fail to encode or decode.

/// Wire encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read needed more bytes than the cursor had left.
    UnexpectedEnd { wanted: usize, available: usize },
    /// A named call was given an empty function name.
    EmptyName,
    /// Function names are at most `MAX_NAME_LEN` bytes.
    NameTooLong(usize),
    /// Function names are NUL terminated on the wire and cannot contain NUL.
    NameContainsNul,
    /// A named payload ended before its NUL terminator.
    MissingTerminator,
    /// The payload would not fit in the 16-bit length field.
    PayloadTooLarge(usize),
    /// Names must be valid UTF-8.
    InvalidUtf8,
    /// Fewer bytes remain than the frame header needs.
    HeaderTruncated(usize),
    /// The declared payload length runs past the end of the delivered bytes.
    FrameTruncated { declared: usize, available: usize },
    /// A callback target used the reserved zero reference.
    NullCallback,
}

impl Error {
    /// Whether frame boundaries are lost past this error.
    ///
    /// Only header and length overruns qualify. A frame whose declared length fits
    /// is consumed whole, so a bad target inside it leaves the next frame readable.
    pub fn ends_payload(&self) -> bool {
        matches!(self, Self::HeaderTruncated(_) | Self::FrameTruncated { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedEnd { wanted, available } => {
                write!(f, "Unexpected end of buffer: wanted {} bytes, {} available", wanted, available)
            }
            Self::EmptyName => write!(f, "Function name is empty"),
            Self::NameTooLong(len) => write!(f, "Function name is {} bytes, limit is {}", len, crate::MAX_NAME_LEN),
            Self::NameContainsNul => write!(f, "Function name contains a NUL byte"),
            Self::MissingTerminator => write!(f, "Function name is not NUL terminated"),
            Self::PayloadTooLarge(len) => write!(f, "Payload of {} bytes exceeds {}", len, u16::MAX),
            Self::InvalidUtf8 => write!(f, "Function name is not valid UTF-8"),
            Self::HeaderTruncated(len) => {
                write!(f, "Frame header truncated: wanted {} bytes, got {}", crate::HEADER_LEN, len)
            }
            Self::FrameTruncated { declared, available } => {
                write!(f, "Frame payload truncated: declared {} bytes, {} available", declared, available)
            }
            Self::NullCallback => write!(f, "Callback reference zero is reserved"),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, Error>;
