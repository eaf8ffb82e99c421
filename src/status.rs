//! Resolver status codes.
//!
//! Every outcome the resolver engine reports is one of these codes. They
//! are stable: the numeric value, the short code such as `ENODATA`, and the
//! message all stay the same between releases so callers can match on them.

use core::fmt;

//------------ Status --------------------------------------------------------

/// The status of a resolver operation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(i32)]
pub enum Status {
    Success = 0,

    /// The server returned an answer with no data.
    ///
    /// This is not an error. The query methods of the channel report it as
    /// [`Answer::NoData`](crate::Answer::NoData).
    NoData = 1,
    FormErr = 2,
    ServFail = 3,
    NotFound = 4,
    NotImp = 5,
    Refused = 6,
    BadQuery = 7,
    BadName = 8,
    BadFamily = 9,

    /// A response could not be decoded.
    BadResp = 10,

    /// No server could be contacted.
    ///
    /// This is the only status that makes the channel reconsider its
    /// server configuration before the next query.
    ConnRefused = 11,
    Timeout = 12,
    Eof = 13,
    File = 14,
    NoMem = 15,
    Destruction = 16,
    BadStr = 17,
    BadFlags = 18,
    NoName = 19,
    BadHints = 20,
    NotInitialized = 21,
    LoadIphlpapi = 22,
    AddrGetNetworkParams = 23,
    Cancelled = 24,

    /// The server list cannot be changed while queries are pending.
    ServersPending = -1000,
}

impl Status {
    const ALL: [Status; 26] = [
        Status::Success,
        Status::NoData,
        Status::FormErr,
        Status::ServFail,
        Status::NotFound,
        Status::NotImp,
        Status::Refused,
        Status::BadQuery,
        Status::BadName,
        Status::BadFamily,
        Status::BadResp,
        Status::ConnRefused,
        Status::Timeout,
        Status::Eof,
        Status::File,
        Status::NoMem,
        Status::Destruction,
        Status::BadStr,
        Status::BadFlags,
        Status::NoName,
        Status::BadHints,
        Status::NotInitialized,
        Status::LoadIphlpapi,
        Status::AddrGetNetworkParams,
        Status::Cancelled,
        Status::ServersPending,
    ];

    /// Returns the status for a numeric value if there is one.
    pub fn from_value(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.value() == value)
    }

    /// Returns the numeric value of the status.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Returns whether this is the success status.
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    /// Returns the short code of the status, e.g., `"ENOTFOUND"`.
    pub fn code(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::NoData => "ENODATA",
            Status::FormErr => "EFORMERR",
            Status::ServFail => "ESERVFAIL",
            Status::NotFound => "ENOTFOUND",
            Status::NotImp => "ENOTIMP",
            Status::Refused => "EREFUSED",
            Status::BadQuery => "EBADQUERY",
            Status::BadName => "EBADNAME",
            Status::BadFamily => "EBADFAMILY",
            Status::BadResp => "EBADRESP",
            Status::ConnRefused => "ECONNREFUSED",
            Status::Timeout => "ETIMEOUT",
            Status::Eof => "EOF",
            Status::File => "EFILE",
            Status::NoMem => "ENOMEM",
            Status::Destruction => "EDESTRUCTION",
            Status::BadStr => "EBADSTR",
            Status::BadFlags => "EBADFLAGS",
            Status::NoName => "ENONAME",
            Status::BadHints => "EBADHINTS",
            Status::NotInitialized => "ENOTINITIALIZED",
            Status::LoadIphlpapi => "ELOADIPHLPAPI",
            Status::AddrGetNetworkParams => "EADDRGETNETWORKPARAMS",
            Status::Cancelled => "ECANCELLED",
            Status::ServersPending => "ESETSRVPENDING",
        }
    }

    /// Returns a human readable description of the status.
    pub fn message(self) -> &'static str {
        match self {
            Status::Success => "Successful completion",
            Status::NoData => "DNS server returned answer with no data",
            Status::FormErr => "DNS server claims query was misformatted",
            Status::ServFail => "DNS server returned general failure",
            Status::NotFound => "Domain name not found",
            Status::NotImp => {
                "DNS server does not implement requested operation"
            }
            Status::Refused => "DNS server refused query",
            Status::BadQuery => "Misformatted DNS query",
            Status::BadName => "Misformatted domain name",
            Status::BadFamily => "Unsupported address family",
            Status::BadResp => "Misformatted DNS reply",
            Status::ConnRefused => "Could not contact DNS servers",
            Status::Timeout => "Timeout while contacting DNS servers",
            Status::Eof => "End of file",
            Status::File => "Error reading file",
            Status::NoMem => "Out of memory",
            Status::Destruction => "Channel is being destroyed",
            Status::BadStr => "Misformatted string",
            Status::BadFlags => "Illegal flags specified",
            Status::NoName => "Given hostname is not numeric",
            Status::BadHints => "Illegal hints flags specified",
            Status::NotInitialized => {
                "resolver library initialization not yet performed"
            }
            Status::LoadIphlpapi => "Error loading iphlpapi.dll",
            Status::AddrGetNetworkParams => {
                "Could not find GetNetworkParams function"
            }
            Status::Cancelled => "DNS query cancelled",
            Status::ServersPending => "There are pending queries.",
        }
    }
}

//--- Display and Error

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Status {}

//------------ strerror ------------------------------------------------------

/// Returns the message for a numeric status value.
///
/// Values that aren't a known status produce `"unknown"`.
pub fn strerror(value: i32) -> &'static str {
    match Status::from_value(value) {
        Some(status) => status.message(),
        None => "unknown",
    }
}

//============ Testing =======================================================
