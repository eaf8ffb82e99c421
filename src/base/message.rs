//! Accessing and building DNS messages.
//!
//! [`Message`] walks the sections of a received message record by record
//! without copying anything but the owner names. Queries are built with
//! [`compose_query`].

use super::header::{Header, HeaderCounts, HeaderSection, HEADER_LEN};
use super::iana::{Class, Rtype};
use super::name::{compose_name, expand_name, skip_name, NameError};
use super::wire::ParseError;
use octseq::parse::Parser;

/// The length of the fixed part of a question after the name.
pub const QUESTION_FIXED_LEN: usize = 4;

/// The length of the fixed part of a record after the owner name.
pub const RECORD_FIXED_LEN: usize = 10;

//------------ Message -------------------------------------------------------

/// A DNS message in wire format.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    octets: &'a [u8],
    section: HeaderSection,
}

impl<'a> Message<'a> {
    /// Creates a message from an octets slice.
    ///
    /// Only checks that the slice is long enough for a header section.
    pub fn from_slice(octets: &'a [u8]) -> Result<Self, ParseError> {
        let section = HeaderSection::parse(&mut Parser::from_ref(octets))?;
        Ok(Message { octets, section })
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.octets
    }

    pub fn header(&self) -> Header {
        self.section.header()
    }

    pub fn counts(&self) -> HeaderCounts {
        self.section.counts()
    }

    /// Returns the first question of the message.
    pub fn first_question(&self) -> Result<Question, ParseError> {
        if self.counts().qdcount == 0 {
            return Err(ParseError::form_error("missing question"));
        }
        let mut parser = self.parser_at(HEADER_LEN)?;
        Question::parse(&mut parser)
    }

    /// Returns an iterator over the records of the answer section.
    pub fn answer(&self) -> Result<RecordIter<'a>, ParseError> {
        let mut parser = self.parser_at(HEADER_LEN)?;
        for _ in 0..self.counts().qdcount {
            skip_name(&mut parser)?;
            parser.advance(QUESTION_FIXED_LEN)?;
        }
        Ok(RecordIter {
            parser,
            remaining: self.counts().ancount,
        })
    }

    /// Returns whether the message answers the given question.
    pub fn is_answer_to(&self, id: u16, question: &Question) -> bool {
        if !self.header().qr() || self.header().id() != id {
            return false;
        }
        match self.first_question() {
            Ok(ref own) => own.eq_ignore_case(question),
            Err(_) => false,
        }
    }

    fn parser_at(&self, pos: usize) -> Result<Parser<'a, [u8]>, ParseError> {
        let mut parser = Parser::from_ref(self.octets);
        parser.seek(pos)?;
        Ok(parser)
    }
}

//------------ Question ------------------------------------------------------

/// A question of a DNS message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub qname: String,
    pub qtype: Rtype,
    pub qclass: Class,
}

impl Question {
    pub fn new(qname: impl Into<String>, qtype: Rtype, qclass: Class) -> Self {
        Question {
            qname: qname.into(),
            qtype,
            qclass,
        }
    }

    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ParseError> {
        Ok(Question {
            qname: expand_name(parser)?,
            qtype: Rtype::parse(parser)?,
            qclass: Class::parse(parser)?,
        })
    }

    /// Compares two questions, ignoring ASCII case and a trailing dot.
    pub fn eq_ignore_case(&self, other: &Question) -> bool {
        self.qtype == other.qtype
            && self.qclass == other.qclass
            && self
                .qname
                .trim_end_matches('.')
                .eq_ignore_ascii_case(other.qname.trim_end_matches('.'))
    }
}

//------------ RecordIter ----------------------------------------------------

/// An iterator over the records of a section.
///
/// The iterator stops after the first error.
#[derive(Clone)]
pub struct RecordIter<'a> {
    parser: Parser<'a, [u8]>,
    remaining: u16,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<ParsedRecord<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let res = ParsedRecord::parse(&mut self.parser);
        if res.is_err() {
            self.remaining = 0;
        }
        Some(res)
    }
}

//------------ ParsedRecord --------------------------------------------------

/// A resource record referencing its data inside the message.
#[derive(Clone, Debug)]
pub struct ParsedRecord<'a> {
    owner: String,
    rtype: Rtype,
    class: Class,
    ttl: u32,
    message: &'a [u8],
    data_start: usize,
    data_len: usize,
}

impl<'a> ParsedRecord<'a> {
    fn parse(parser: &mut Parser<'a, [u8]>) -> Result<Self, ParseError> {
        let owner = expand_name(parser)?;
        let rtype = Rtype::parse(parser)?;
        let class = Class::parse(parser)?;
        let ttl = parser.parse_u32_be()?;
        let data_len = usize::from(parser.parse_u16_be()?);
        let data_start = parser.pos();
        parser.advance(data_len)?;
        Ok(ParsedRecord {
            owner,
            rtype,
            class,
            ttl,
            message: parser.octets_ref(),
            data_start,
            data_len,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the TTL with the sign bit cleared.
    pub fn ttl(&self) -> u32 {
        self.ttl & 0x7FFF_FFFF
    }

    /// Returns the record data.
    pub fn data(&self) -> &'a [u8] {
        &self.message[self.data_start..self.data_start + self.data_len]
    }

    /// Returns a parser positioned at the start of the record data.
    ///
    /// The parser covers the whole message so compressed names in the
    /// record data can be expanded. Use [`data_end`][Self::data_end] to
    /// check that parsing stays within the data.
    pub fn data_parser(&self) -> Parser<'a, [u8]> {
        let mut parser = Parser::from_ref(self.message);
        // The position was reached during parsing, so it exists.
        let _ = parser.seek(self.data_start);
        parser
    }

    /// Returns the message position right after the record data.
    pub fn data_end(&self) -> usize {
        self.data_start + self.data_len
    }
}

//------------ compose_query -------------------------------------------------

/// Builds a query message with a single question.
pub fn compose_query(
    id: u16,
    question: &Question,
    recursion_desired: bool,
) -> Result<Vec<u8>, NameError> {
    let mut section = HeaderSection::new();
    section.header_mut().set_id(id);
    section.header_mut().set_rd(recursion_desired);
    section.counts_mut().qdcount = 1;

    let mut res = Vec::with_capacity(HEADER_LEN + question.qname.len() + 6);
    section.compose(&mut res);
    compose_name(&question.qname, &mut res)?;
    res.extend_from_slice(&question.qtype.to_int().to_be_bytes());
    res.extend_from_slice(&question.qclass.to_int().to_be_bytes());
    Ok(res)
}

//============ Testing =======================================================
