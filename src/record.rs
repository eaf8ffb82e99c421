//! Record values.
//!
//! These are the decoded results handed to callers. They are plain values
//! that own their data and don’t reference the response they came from.

use crate::base::iana::Rtype;
use bytes::Bytes;
use std::net::IpAddr;

//------------ Answer --------------------------------------------------------

/// The outcome of a successful query.
///
/// A server may answer a question without any records of the requested
/// type. This is not an error, so it is a variant of the answer rather than
/// of the error.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Answer<T> {
    /// The records found.
    Found(T),

    /// The name exists but has no records of the requested type.
    NoData,
}

impl<T> Answer<T> {
    /// Converts the answer into an option.
    pub fn found(self) -> Option<T> {
        match self {
            Answer::Found(value) => Some(value),
            Answer::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Answer::NoData)
    }

    /// Maps the found value.
    pub fn map<U, F: FnOnce(T) -> U>(self, op: F) -> Answer<U> {
        match self {
            Answer::Found(value) => Answer::Found(op(value)),
            Answer::NoData => Answer::NoData,
        }
    }
}

impl<T: Default> Answer<T> {
    /// Returns the found value or the default for no data.
    pub fn unwrap_or_default(self) -> T {
        self.found().unwrap_or_default()
    }
}

//------------ AddrTtl -------------------------------------------------------

/// An address together with the TTL of its record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AddrTtl {
    pub addr: IpAddr,
    pub ttl: u32,
}

//------------ Mx ------------------------------------------------------------

/// Mail exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mx {
    pub exchange: String,
    pub priority: u16,
}

//------------ Txt -----------------------------------------------------------

/// The character strings of a single TXT record.
///
/// A record may carry more than one string. They are kept separate and in
/// order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Txt {
    chunks: Vec<Bytes>,
}

impl Txt {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Txt { chunks }
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Bytes> {
        self.chunks
    }

    /// Returns all chunks concatenated.
    pub fn concat(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect()
    }
}

//------------ Srv -----------------------------------------------------------

/// Server selection.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Srv {
    pub name: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

//------------ Naptr ---------------------------------------------------------

/// Naming authority pointer.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Naptr {
    pub flags: String,
    pub service: String,
    pub regexp: String,
    pub replacement: String,
    pub order: u16,
    pub preference: u16,
}

//------------ Soa -----------------------------------------------------------

/// Start of a zone of authority.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Soa {
    /// The primary name server of the zone.
    pub nsname: String,

    /// The mailbox of the person responsible for the zone.
    pub hostmaster: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minttl: u32,
}

//------------ Caa -----------------------------------------------------------

/// Certification authority authorization.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Caa {
    /// The flags octet. Only the issuer critical bit is defined.
    pub critical: u8,
    pub property: String,
    pub value: Bytes,
}

//------------ AnyRecord -----------------------------------------------------

/// A record of any of the types an aggregate query returns.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AnyRecord {
    A(AddrTtl),
    Aaaa(AddrTtl),
    Cname(String),
    Mx(Mx),
    Ns(String),
    Txt(Txt),
    Srv(Srv),
    Ptr(String),
    Naptr(Naptr),
    Soa(Soa),
    Caa(Caa),
}

impl AnyRecord {
    /// Returns the record type of the record.
    pub fn rtype(&self) -> Rtype {
        match self {
            AnyRecord::A(_) => Rtype::A,
            AnyRecord::Aaaa(_) => Rtype::AAAA,
            AnyRecord::Cname(_) => Rtype::CNAME,
            AnyRecord::Mx(_) => Rtype::MX,
            AnyRecord::Ns(_) => Rtype::NS,
            AnyRecord::Txt(_) => Rtype::TXT,
            AnyRecord::Srv(_) => Rtype::SRV,
            AnyRecord::Ptr(_) => Rtype::PTR,
            AnyRecord::Naptr(_) => Rtype::NAPTR,
            AnyRecord::Soa(_) => Rtype::SOA,
            AnyRecord::Caa(_) => Rtype::CAA,
        }
    }
}
