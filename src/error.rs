//! The error type of the channel.

use crate::status::Status;
use core::fmt;

//------------ Error ---------------------------------------------------------

/// An error happened while using a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The channel could not be set up.
    ///
    /// Either the process-wide resolver library or the channel's own engine
    /// failed to initialize. The channel is not usable.
    Init(Status),

    /// A query or a configuration change failed with the given status.
    Resolve(Status),

    /// An argument was rejected before it reached the engine.
    InvalidArgument(&'static str),
}

impl Error {
    /// Returns the status behind the error if there is one.
    pub fn status(&self) -> Option<Status> {
        match *self {
            Error::Init(status) | Error::Resolve(status) => Some(status),
            Error::InvalidArgument(_) => None,
        }
    }

    /// Returns the short status code such as `"ETIMEOUT"`.
    ///
    /// Invalid arguments are reported as `"EINVAL"`.
    pub fn code(&self) -> &'static str {
        match self.status() {
            Some(status) => status.code(),
            None => "EINVAL",
        }
    }
}

//--- From

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Resolve(status)
    }
}

//--- Display and Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Init(status) => {
                write!(f, "failed to initialize channel: {}", status)
            }
            Error::Resolve(status) => write!(f, "{}: {}", status.code(), status),
            Error::InvalidArgument(msg) => {
                write!(f, "invalid argument: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Init(status) | Error::Resolve(status) => Some(status),
            Error::InvalidArgument(_) => None,
        }
    }
}
