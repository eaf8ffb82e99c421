//! The header of a DNS message.
//!
//! Each DNS message starts with a twelve octet long header section
//! containing some general information related to the message as well as
//! the number of records in each of the four sections that follow the header.
//! Its content and format are defined in section 4.1.1 of [RFC 1035].
//!
//! The first four octets are kept as [`Header`], the section counts as
//! [`HeaderCounts`]. [`HeaderSection`] wraps both of them.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use super::iana::Rcode;
use super::wire::ParseError;
use octseq::parse::Parser;

/// The length of the header section in octets.
pub const HEADER_LEN: usize = 12;

//------------ Header --------------------------------------------------------

/// The first part of the header of a DNS message.
///
/// This type keeps the ID, opcode, flags, and rcode in their wire
/// representation:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|Z |AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Only the fields a stub resolver needs have accessors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    inner: [u8; 4],
}

impl Header {
    /// Creates a new header with all fields zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the ID field.
    pub fn id(self) -> u16 {
        u16::from_be_bytes([self.inner[0], self.inner[1]])
    }

    /// Sets the value of the ID field.
    pub fn set_id(&mut self, value: u16) {
        self.inner[..2].copy_from_slice(&value.to_be_bytes())
    }

    /// Returns whether the QR bit is set, i.e., the message is a response.
    pub fn qr(self) -> bool {
        self.get_bit(2, 7)
    }

    /// Sets the value of the QR bit.
    pub fn set_qr(&mut self, set: bool) {
        self.set_bit(2, 7, set)
    }

    /// Returns whether the RD bit is set.
    pub fn rd(self) -> bool {
        self.get_bit(2, 0)
    }

    /// Sets the value of the RD bit.
    pub fn set_rd(&mut self, set: bool) {
        self.set_bit(2, 0, set)
    }

    /// Returns the value of the RCODE field.
    pub fn rcode(self) -> Rcode {
        Rcode::from_int(self.inner[3] & 0x0F)
    }

    /// Sets the value of the RCODE field.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.inner[3] = self.inner[3] & 0xF0 | (rcode.to_int() & 0x0F);
    }

    //--- Internal helpers

    fn get_bit(self, offset: usize, bit: usize) -> bool {
        self.inner[offset] & (1 << bit) != 0
    }

    fn set_bit(&mut self, offset: usize, bit: usize, set: bool) {
        if set {
            self.inner[offset] |= 1 << bit
        } else {
            self.inner[offset] &= !(1 << bit)
        }
    }
}

//------------ HeaderCounts --------------------------------------------------

/// The section counts of a DNS message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderCounts {
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

//------------ HeaderSection -------------------------------------------------

/// The complete header section of a DNS message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderSection {
    header: Header,
    counts: HeaderCounts,
}

impl HeaderSection {
    /// Creates a new header section with everything zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn counts(&self) -> HeaderCounts {
        self.counts
    }

    pub fn counts_mut(&mut self) -> &mut HeaderCounts {
        &mut self.counts
    }

    /// Takes a header section from the beginning of a parser.
    pub fn parse<Octs: AsRef<[u8]> + ?Sized>(
        parser: &mut Parser<Octs>,
    ) -> Result<Self, ParseError> {
        let mut header = Header::new();
        parser.parse_buf(&mut header.inner)?;
        let counts = HeaderCounts {
            qdcount: parser.parse_u16_be()?,
            ancount: parser.parse_u16_be()?,
            nscount: parser.parse_u16_be()?,
            arcount: parser.parse_u16_be()?,
        };
        Ok(HeaderSection { header, counts })
    }

    /// Appends the wire format of the header section.
    pub fn compose(&self, target: &mut Vec<u8>) {
        target.extend_from_slice(&self.header.inner);
        for count in [
            self.counts.qdcount,
            self.counts.ancount,
            self.counts.nscount,
            self.counts.arcount,
        ] {
            target.extend_from_slice(&count.to_be_bytes());
        }
    }
}

//============ Testing =======================================================
