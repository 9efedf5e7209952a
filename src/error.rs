//! Error and result.
//!
//! Most operations in this crate return their own `Error` type which covers
//! both protocol-level conditions (an object wasn’t found, a handle is
//! stale, a flag had the wrong type) and IO failures bubbling up from the
//! sockets. Protocol conditions double as wire codes: a STATUS message
//! carries the numeric form produced by [code()](enum.Error.html#method.code)
//! in its `result` value, with zero reserved for success.

use std::error;
use std::fmt;
use std::io;
use std::result;


//------------ Error --------------------------------------------------------

/// The error type.
///
#[derive(Debug)]
pub enum Error {
    /// No object matched a lookup or a handle is not live.
    NotFound,

    /// A lookup specification contained no usable key values.
    NoKeys,

    /// An object matching the specification already exists.
    Exists,

    /// A request carried an argument that makes no sense for its operation.
    InvalidArg,

    /// The operation exists in the protocol but not on this object type.
    NotImplemented,

    /// A typed value was accessed as the wrong variant.
    WrongType,

    /// The operation was dropped before it could run.
    Canceled,

    /// An internal inconsistency that should not occur in normal operation.
    Unexpected,

    /// An allocation-style failure reported by a peer.
    NoMemory,

    /// The event loop ran out of machine slots.
    NoSlabSpace,

    /// An IO error from the operating system.
    Io(io::Error),
}

impl Error {
    /// Returns the wire code for this error.
    ///
    /// Codes are stable; `0` means success and is never produced here.
    pub fn code(&self) -> u32 {
        match *self {
            Error::NoMemory => 1,
            Error::NotFound => 2,
            Error::NoKeys => 3,
            Error::Exists => 4,
            Error::InvalidArg => 5,
            Error::NotImplemented => 6,
            Error::WrongType => 7,
            Error::Canceled => 8,
            Error::Unexpected => 9,
            Error::NoSlabSpace => 9,
            Error::Io(_) => 10,
        }
    }

    /// Translates a wire code back into an error.
    ///
    /// Returns `None` for `SUCCESS`. Codes that don’t map to a concrete
    /// variant, including IO errors which cannot cross the wire, come back
    /// as `Error::Unexpected`.
    pub fn from_code(code: u32) -> Option<Error> {
        match code {
            SUCCESS => None,
            1 => Some(Error::NoMemory),
            2 => Some(Error::NotFound),
            3 => Some(Error::NoKeys),
            4 => Some(Error::Exists),
            5 => Some(Error::InvalidArg),
            6 => Some(Error::NotImplemented),
            7 => Some(Error::WrongType),
            8 => Some(Error::Canceled),
            _ => Some(Error::Unexpected),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            ref err => f.write_str(error::Error::description(err))
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::NotFound => "not found",
            Error::NoKeys => "no usable key values",
            Error::Exists => "already exists",
            Error::InvalidArg => "invalid argument",
            Error::NotImplemented => "not implemented",
            Error::WrongType => "wrong value type",
            Error::Canceled => "operation canceled",
            Error::Unexpected => "unexpected error",
            Error::NoMemory => "out of memory",
            Error::NoSlabSpace => "slab space limit reached",
            Error::Io(ref err) => err.description(),
        }
    }

    fn cause(&self) -> Option<&error::Error> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}


//------------ Result -------------------------------------------------------

pub type Result<T> = result::Result<T, Error>;


//------------ Wire codes ---------------------------------------------------

/// The wire code for success.
pub const SUCCESS: u32 = 0;


//============ Test ==========================================================
