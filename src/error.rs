//! Runtime error types
//!
//! Every fallible runtime operation returns [`Error`]. At the C boundary an
//! error collapses to an [`Errno`] value, which is what a C library expects
//! to find in `errno`.

use core::fmt;

/// A C `errno` value.
///
/// Host-reported codes are passed through untouched, so this is an open
/// newtype rather than a closed enum.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Errno(pub i32);

impl Errno {
    /// Bad file descriptor
    pub const EBADF: Self = Self(9);
    /// Out of memory
    pub const ENOMEM: Self = Self(12);
    /// Bad address (invalid pointer)
    pub const EFAULT: Self = Self(14);
    /// Invalid argument
    pub const EINVAL: Self = Self(22);
    /// Illegal seek
    pub const ESPIPE: Self = Self(29);
    /// Value too large for defined data type (newlib's numbering)
    pub const EOVERFLOW: Self = Self(139);

    /// Get the raw value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno({})", self.0)
    }
}

/// Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The host answered a trap with a negative result.
    ///
    /// Carries the code returned by the follow-up `ERRNO` trap.
    Host(Errno),
    /// The emulation does not implement the requested mode (non-absolute seek).
    Unsupported,
    /// A null or otherwise unusable pointer crossed the C boundary.
    BadAddress,
    /// The program break cannot move that far.
    OutOfMemory,
    /// External interrupt line outside the vector table.
    InvalidLine(u32),
    /// A value cannot be represented in the C return type.
    Overflow,
}

impl Error {
    /// The `errno` value reported to C callers for this error.
    pub const fn errno(self) -> Errno {
        match self {
            Error::Host(errno) => errno,
            Error::Unsupported => Errno::ESPIPE,
            Error::BadAddress => Errno::EFAULT,
            Error::OutOfMemory => Errno::ENOMEM,
            Error::InvalidLine(_) => Errno::EINVAL,
            Error::Overflow => Errno::EOVERFLOW,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Host(errno) => write!(f, "host error {}", errno.0),
            Error::Unsupported => f.write_str("operation not supported"),
            Error::BadAddress => f.write_str("bad address"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::InvalidLine(line) => write!(f, "no vector slot for external line {}", line),
            Error::Overflow => f.write_str("value too large for return type"),
        }
    }
}

/// Result alias for runtime operations
pub type Result<T> = core::result::Result<T, Error>;
