//! Domain names.
//!
//! The channel hands names around in their presentation format. This module
//! converts between that and the wire format. Names found inside a message
//! may be compressed as described in section 4.1.4 of [RFC 1035], so
//! expanding them needs access to the complete message.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use super::wire::{FormError, ParseError};
use core::fmt;
use octseq::parse::Parser;
use std::net::IpAddr;

/// The maximum length of a name in wire format.
pub const MAX_NAME_LEN: usize = 255;

/// The maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

//------------ expand_name ---------------------------------------------------

/// Expands the possibly compressed name at the parser's position.
///
/// The parser needs to cover the complete message so that compression
/// pointers can be followed. It is left behind the name as it appears in
/// place, i.e., right after the first compression pointer if there is one.
///
/// The returned name is in presentation format without the trailing dot.
/// The root name is returned as an empty string.
pub fn expand_name<Octs: AsRef<[u8]> + ?Sized>(
    parser: &mut Parser<Octs>,
) -> Result<String, ParseError> {
    let mut res = String::new();
    let mut name_len = 0;

    // Phase One: No compression pointers have been found yet.
    let mut ptr = loop {
        match LabelType::parse(parser)? {
            LabelType::Normal(0) => return Ok(res),
            LabelType::Normal(label_len) => {
                let label_len = usize::from(label_len);
                push_label(&mut res, parser.peek(label_len)?);
                parser.advance(label_len)?;
                name_len += label_len + 1;
                if name_len >= MAX_NAME_LEN {
                    return Err(NameError::LongName.into());
                }
            }
            LabelType::Compressed(ptr) => break ptr,
        }
    };

    // Phase Two: Follow the pointers on a copy of the parser.
    let mut parser = *parser;
    loop {
        // The pointer has to point to somewhere before itself. Since every
        // label we read in between adds to the name length, this rules out
        // loops.
        if ptr >= parser.pos() - 2 {
            return Err(NameError::ExcessiveCompression.into());
        }
        parser.seek(ptr)?;

        loop {
            match LabelType::parse(&mut parser)? {
                LabelType::Normal(0) => return Ok(res),
                LabelType::Normal(label_len) => {
                    let label_len = usize::from(label_len);
                    push_label(&mut res, parser.peek(label_len)?);
                    parser.advance(label_len)?;
                    name_len += label_len + 1;
                    if name_len >= MAX_NAME_LEN {
                        return Err(NameError::LongName.into());
                    }
                }
                LabelType::Compressed(new_ptr) => {
                    ptr = new_ptr;
                    break;
                }
            }
        }
    }
}

/// Appends a label in presentation format.
fn push_label(target: &mut String, label: &[u8]) {
    if !target.is_empty() {
        target.push('.');
    }
    for &ch in label {
        match ch {
            b'"' | b'.' | b';' | b'\\' | b'(' | b')' | b'@' | b'$' => {
                target.push('\\');
                target.push(char::from(ch));
            }
            0x20..=0x7E => target.push(char::from(ch)),
            _ => {
                target.push('\\');
                target.push_str(&format!("{:03}", ch));
            }
        }
    }
}

/// Skips over a possibly compressed name.
///
/// Only the part of the name in place is checked.
pub fn skip_name<Octs: AsRef<[u8]> + ?Sized>(
    parser: &mut Parser<Octs>,
) -> Result<(), ParseError> {
    let mut len = 0;
    loop {
        match LabelType::parse(parser)? {
            LabelType::Normal(0) => return Ok(()),
            LabelType::Normal(label_len) => {
                parser.advance(label_len.into())?;
                len += usize::from(label_len) + 1;
                if len >= MAX_NAME_LEN {
                    return Err(NameError::LongName.into());
                }
            }
            LabelType::Compressed(_) => return Ok(()),
        }
    }
}

//------------ compose_name --------------------------------------------------

/// Appends the wire format of a name given in presentation format.
///
/// A trailing dot is optional. Both `""` and `"."` denote the root. Inside
/// a label, a backslash escapes the next character or introduces a three
/// digit decimal octet value.
pub fn compose_name(name: &str, target: &mut Vec<u8>) -> Result<(), NameError> {
    let start = target.len();
    let name = name.as_bytes();
    if name.is_empty() || name == b"." {
        target.push(0);
        return Ok(());
    }

    let mut label = Vec::with_capacity(MAX_LABEL_LEN);
    let mut chars = name.iter().copied().enumerate().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            b'.' => {
                if label.is_empty() {
                    return Err(NameError::EmptyLabel);
                }
                append_label(target, &label)?;
                label.clear();
                // A trailing dot ends the name.
                if idx + 1 == name.len() {
                    break;
                }
            }
            b'\\' => {
                let (_, first) = chars.next().ok_or(NameError::BadEscape)?;
                if first.is_ascii_digit() {
                    let mut value = u32::from(first - b'0');
                    for _ in 0..2 {
                        match chars.next() {
                            Some((_, digit)) if digit.is_ascii_digit() => {
                                value = value * 10 + u32::from(digit - b'0');
                            }
                            _ => return Err(NameError::BadEscape),
                        }
                    }
                    label.push(
                        u8::try_from(value)
                            .map_err(|_| NameError::BadEscape)?,
                    );
                } else {
                    label.push(first);
                }
            }
            _ => label.push(ch),
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(NameError::LongLabel);
        }
    }
    if !label.is_empty() {
        append_label(target, &label)?;
    }
    target.push(0);
    if target.len() - start > MAX_NAME_LEN {
        target.truncate(start);
        return Err(NameError::LongName);
    }
    Ok(())
}

fn append_label(target: &mut Vec<u8>, label: &[u8]) -> Result<(), NameError> {
    let len = u8::try_from(label.len()).map_err(|_| NameError::LongLabel)?;
    target.push(len);
    target.extend_from_slice(label);
    Ok(())
}

//------------ reverse_name --------------------------------------------------

/// Returns the name used for reverse lookups of an address.
pub fn reverse_name(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            format!(
                "{}.{}.{}.{}.in-addr.arpa",
                octets[3], octets[2], octets[1], octets[0]
            )
        }
        IpAddr::V6(addr) => {
            let mut res = String::with_capacity(72);
            for &item in addr.octets().iter().rev() {
                res.push(hexdigit(item));
                res.push('.');
                res.push(hexdigit(item >> 4));
                res.push('.');
            }
            res.push_str("ip6.arpa");
            res
        }
    }
}

fn hexdigit(nibble: u8) -> char {
    char::from(b"0123456789abcdef"[usize::from(nibble & 0x0F)])
}

//------------ LabelType -----------------------------------------------------

/// The type of a label.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LabelType {
    /// A normal label with its size in octets.
    Normal(u8),

    /// A compressed label with the position of where to continue.
    Compressed(usize),
}

impl LabelType {
    /// Attempts to take a label type from the beginning of `parser`.
    fn parse<Octs: AsRef<[u8]> + ?Sized>(
        parser: &mut Parser<Octs>,
    ) -> Result<Self, ParseError> {
        let ltype = parser.parse_u8()?;
        match ltype {
            0..=0x3F => Ok(LabelType::Normal(ltype)),
            0xC0..=0xFF => {
                let res = usize::from(parser.parse_u8()?);
                let res = res | ((usize::from(ltype) & 0x3F) << 8);
                Ok(LabelType::Compressed(res))
            }
            _ => Err(ParseError::Form(FormError::new("invalid label type"))),
        }
    }
}

//------------ NameError -----------------------------------------------------

/// A name could not be read or built.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// The name is longer than the 255 octets allowed.
    LongName,

    /// A label is longer than 63 octets.
    LongLabel,

    /// A label other than the final root label is empty.
    EmptyLabel,

    /// A backslash escape is incomplete or out of range.
    BadEscape,

    /// Compression pointers point forward or form a loop.
    ExcessiveCompression,
}

//--- From

impl From<NameError> for FormError {
    fn from(err: NameError) -> FormError {
        FormError::new(match err {
            NameError::LongName => "long domain name",
            NameError::LongLabel => "long label",
            NameError::EmptyLabel => "empty label",
            NameError::BadEscape => "invalid escape sequence",
            NameError::ExcessiveCompression => "too many compression pointers",
        })
    }
}

impl From<NameError> for ParseError {
    fn from(err: NameError) -> ParseError {
        ParseError::Form(err.into())
    }
}

//--- Display and Error

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        FormError::from(*self).fmt(f)
    }
}

impl std::error::Error for NameError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn expand(msg: &[u8], pos: usize) -> Result<(String, usize), ParseError> {
        let mut parser = Parser::from_ref(msg);
        parser.advance(pos).unwrap();
        let name = expand_name(&mut parser)?;
        Ok((name, parser.pos()))
    }

    #[test]
    fn expand_plain() {
        let msg = b"\x03www\x07example\x03com\x00\xff";
        assert_eq!(
            expand(msg, 0).unwrap(),
            ("www.example.com".into(), 17)
        );
        assert_eq!(expand(b"\x00", 0).unwrap(), (String::new(), 1));
    }

    #[test]
    fn expand_compressed() {
        // example.com at 0, www + pointer to 0 at 13.
        let msg = b"\x07example\x03com\x00\x03www\xc0\x00";
        assert_eq!(expand(msg, 13).unwrap(), ("www.example.com".into(), 19));

        // A pointer chain: mail -> www -> example.com.
        let mut msg = msg.to_vec();
        msg.extend_from_slice(b"\x04mail\xc0\x0d");
        assert_eq!(
            expand(&msg, 19).unwrap(),
            ("mail.www.example.com".into(), 26)
        );
    }

    #[test]
    fn expand_rejects_forward_and_self_pointers() {
        assert_eq!(
            expand(b"\xc0\x02\x00", 0),
            Err(NameError::ExcessiveCompression.into())
        );
        assert_eq!(
            expand(b"\x00\xc0\x01", 1),
            Err(NameError::ExcessiveCompression.into())
        );
    }

    #[test]
    fn expand_rejects_loops() {
        // The pointer at 2 leads back to the label at 0 over and over.
        let msg = b"\x01a\xc0\x00";
        assert_eq!(expand(msg, 0), Err(NameError::LongName.into()));
    }

    #[test]
    fn expand_rejects_truncated() {
        assert_eq!(expand(b"\x03ww", 0), Err(ParseError::ShortInput));
        assert_eq!(expand(b"\x03www", 0), Err(ParseError::ShortInput));
        assert!(matches!(expand(b"\x40", 0), Err(ParseError::Form(_))));
    }

    #[test]
    fn expand_escapes() {
        let msg = b"\x04a.b\\\x02\x01x\x00";
        assert_eq!(expand(msg, 0).unwrap().0, "a\\.b\\\\.\\001x");
    }

    #[test]
    fn skip() {
        let mut parser = Parser::from_ref(&b"\x03www\xc0\x00\xff"[..]);
        skip_name(&mut parser).unwrap();
        assert_eq!(parser.pos(), 6);
    }

    #[test]
    fn compose() {
        let mut buf = Vec::new();
        compose_name("www.example.com", &mut buf).unwrap();
        assert_eq!(buf, b"\x03www\x07example\x03com\x00");

        let mut dotted = Vec::new();
        compose_name("www.example.com.", &mut dotted).unwrap();
        assert_eq!(buf, dotted);

        let mut root = Vec::new();
        compose_name(".", &mut root).unwrap();
        assert_eq!(root, b"\x00");

        let mut escaped = Vec::new();
        compose_name("a\\.b.\\065", &mut escaped).unwrap();
        assert_eq!(escaped, b"\x03a.b\x01A\x00");
    }

    #[test]
    fn compose_errors() {
        let mut buf = Vec::new();
        assert_eq!(compose_name("a..b", &mut buf), Err(NameError::EmptyLabel));
        assert_eq!(compose_name(".a", &mut buf), Err(NameError::EmptyLabel));
        assert_eq!(
            compose_name(&"x".repeat(64), &mut buf),
            Err(NameError::LongLabel)
        );
        assert_eq!(compose_name("a\\25", &mut buf), Err(NameError::BadEscape));
        assert_eq!(compose_name("a\\256", &mut buf), Err(NameError::BadEscape));

        let mut buf = Vec::new();
        let long = vec!["x".repeat(60); 5].join(".");
        assert_eq!(compose_name(&long, &mut buf), Err(NameError::LongName));
        assert!(buf.is_empty());
    }

    #[test]
    fn reverse() {
        assert_eq!(
            reverse_name("192.0.2.10".parse().unwrap()),
            "10.2.0.192.in-addr.arpa"
        );
        assert_eq!(
            reverse_name("2001:db8::567:89ab".parse().unwrap()),
            "b.a.9.8.7.6.5.0.0.0.0.0.0.0.0.0.\
             0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa"
        );
    }
}
