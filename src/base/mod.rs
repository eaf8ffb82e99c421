//! Handling of DNS data.
//!
//! This module provides the wire format pieces the resolver needs: record
//! types and classes, the message header, domain names, and walking and
//! building messages.

pub use self::header::{Header, HeaderCounts, HeaderSection};
pub use self::iana::{Class, Rcode, Rtype};
pub use self::message::{Message, ParsedRecord, Question, RecordIter};
pub use self::wire::{FormError, ParseError};

pub mod header;
pub mod iana;
pub mod message;
pub mod name;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;
