//! Error types for the CiA 613-3 engine.
//!
//! Protocol-level violations are never represented here: they are
//! non-fatal and are handled by dropping the offending frame and, in
//! checker mode, emitting a notification (see
//! [`crate::notify`]). This enum is reserved for failures that prevent an
//! operation from producing a result at all: malformed wire data handed to
//! the codec, a misconfigured engine, or a failure surfaced by the
//! underlying [`crate::io::FrameIo`] transport.

use core::fmt;

/// Result type alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by the CiA 613-3 engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer handed to `CanXlFrame::deserialize` is shorter than the
    /// fixed CAN XL header.
    BufferTooSmall,

    /// The buffer's length does not match `HDR_SIZE + len`, or the `XLF`
    /// flag is not set.
    MalformedFrame,

    /// `len` is outside `MIN_DLEN..=MAX_DLEN`.
    InvalidLength,

    /// A configuration value is outside the allowed range (fragment size,
    /// `maxbuffs`, `maxlpcnt`).
    InvalidConfig,

    /// The underlying frame transport failed to read a frame.
    IoRead,

    /// The underlying frame transport wrote fewer bytes than requested.
    IoShortWrite,

    /// The underlying frame transport reached end of stream.
    IoEof,
}

impl Error {
    /// Returns a human-readable description of the error.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::BufferTooSmall => "buffer too small for a CAN XL frame",
            Error::MalformedFrame => "malformed CAN XL frame",
            Error::InvalidLength => "data length outside CAN XL bounds",
            Error::InvalidConfig => "configuration value out of range",
            Error::IoRead => "frame transport read error",
            Error::IoShortWrite => "frame transport short write",
            Error::IoEof => "frame transport end of stream",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
