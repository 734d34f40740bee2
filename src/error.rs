//! Representations of errors returned by this crate.

use crate::buffer::BufferError;

/// Code returned by [`Error::code`](Error::code) counterparts on success.
pub const OK: i32 = 0;

/// Set of errors that can occur while feeding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An error that has no more specific representation.
    #[error("unspecified error")]
    Unspecified,

    /// Backing storage for the ring buffer could not be allocated.
    #[error("memory allocation error")]
    AllocationFailure,

    /// An argument was zero-sized or otherwise out of range.
    #[error("invalid argument")]
    InvalidArgument,

    /// The ring buffer cannot take the fed bytes. Nothing was written.
    #[error("buffer full: {length} bytes fed but only {free} bytes free")]
    BufferFull {
        /// Number of bytes that were fed.
        length: usize,

        /// Number of free bytes in the ring buffer.
        free: usize,
    },

    /// The packet callback aborted decoding with a user-defined code.
    #[error("decoding aborted by packet callback (code {0})")]
    Callback(i32),
}

impl Error {
    /// Numerical representation of this error. Always negative.
    pub fn code(&self) -> i32 {
        match self {
            Error::Unspecified => -1,
            Error::AllocationFailure => -2,
            Error::InvalidArgument => -3,
            Error::BufferFull { .. } => -4,
            Error::Callback(_) => -5,
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::Full { length, free } => Error::BufferFull { length, free },
            BufferError::InsufficientData { .. } => Error::Unspecified,
        }
    }
}

/// Malformed packet contents. These never abort decoding: the packet
/// is reported as unknown or with its invalid bits masked off, and the
/// condition is logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum MalformedPacket {
    /// A run of zero bits too short to form a synchronization packet.
    #[error("Invalid synchronization packet: only {0} zero bits, expected at least 48.")]
    InvalidSync(usize),

    /// Bits beyond the timestamp fields of a timestamp packet are set.
    #[error("{kind} packet contains invalid trailing bits: {field:#x}.")]
    TrailingBits { kind: &'static str, field: u32 },

    /// A GTS2 packet whose payload is not 4 bytes long.
    #[error("Global timestamp (GTS2) packet with invalid payload size: {0} bytes.")]
    InvalidGts2Size(usize),

    /// A DWT packet layout matched on address but not on size.
    #[error("Invalid {kind} packet size: {size} bytes.")]
    InvalidSize { kind: &'static str, size: usize },

    /// A 2-byte periodic PC sample with a non-zero payload.
    #[error("Periodic PC sleep packet contains invalid value: {0:#x}.")]
    InvalidPcSleep(u32),
}

/// Returns a human readable description of an error code.
pub fn strerror(code: i32) -> &'static str {
    match code {
        OK => "no error",
        -1 => "unspecified error",
        -2 => "memory allocation error",
        -3 => "invalid argument",
        -4 => "buffer full",
        -5 => "decoding aborted by packet callback",
        _ => "unknown error",
    }
}

/// Returns the symbolic name of an error code.
pub fn strerror_name(code: i32) -> &'static str {
    match code {
        OK => "SWO_OK",
        -1 => "SWO_ERR",
        -2 => "SWO_ERR_MALLOC",
        -3 => "SWO_ERR_ARG",
        -4 => "SWO_ERR_BUFFER_FULL",
        -5 => "SWO_ERR_CALLBACK",
        _ => "unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_names() {
        for e in [
            Error::Unspecified,
            Error::AllocationFailure,
            Error::InvalidArgument,
            Error::BufferFull { length: 2, free: 1 },
            Error::Callback(7),
        ]
        .iter()
        {
            assert!(e.code() < 0);
            assert_ne!(strerror(e.code()), "unknown error");
            assert_ne!(strerror_name(e.code()), "unknown error code");
        }

        assert_eq!(strerror(OK), "no error");
        assert_eq!(strerror_name(-3), "SWO_ERR_ARG");
        assert_eq!(strerror(42), "unknown error");
        assert_eq!(strerror_name(42), "unknown error code");
    }
}
