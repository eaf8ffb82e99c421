//! IANA Definitions for DNS.
//!
//! This module contains types for the parameters defined in IANA registries
//! that the channel and its parsers need: record types, classes, and
//! header response codes.
//!
//! Each type wraps the raw integer value and has associated constants for
//! the values the crate needs. Any other value is still valid. It just
//! has no name and prints as its number.

pub use self::class::Class;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod rcode;
pub mod rtype;
