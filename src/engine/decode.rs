//! Decoding responses into record values.
//!
//! Each function takes a complete response and returns the records of one
//! type from the answer section. The response must have exactly one
//! question. If the answer section is empty or contains no matching
//! records, the functions return [`Status::NoData`]. A response that can’t
//! be decoded results in [`Status::BadResp`].
//!
//! Only records of class IN are considered.

use super::HostEnt;
use crate::base::iana::{Class, Rtype};
use crate::base::message::{Message, ParsedRecord, Question};
use crate::base::name::expand_name;
use crate::base::wire::ParseError;
use crate::record::{AddrTtl, Caa, Mx, Naptr, Soa, Srv};
use crate::status::Status;
use bytes::Bytes;
use octseq::parse::Parser;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

//------------ TxtChunk ------------------------------------------------------

/// A single character string of a TXT record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxtChunk {
    pub data: Bytes,

    /// Whether this is the first string of its record.
    pub record_start: bool,
}

//------------ Address records -----------------------------------------------

/// Decodes the A records of a response.
///
/// The records are collected for the question name and, following CNAME
/// records in order, for each canonical name. The returned host entry
/// carries the final canonical name, the owners of the CNAME records as
/// aliases, and the addresses. The TTL of an address is capped by the TTLs
/// of the CNAME records leading to it.
///
/// The response has no data if it contains neither addresses nor aliases.
pub fn parse_a_reply(buf: &[u8]) -> Result<(HostEnt, Vec<AddrTtl>), Status> {
    parse_addr_reply(buf, Rtype::A)
}

/// Decodes the AAAA records of a response.
///
/// See [`parse_a_reply`] for details.
pub fn parse_aaaa_reply(
    buf: &[u8],
) -> Result<(HostEnt, Vec<AddrTtl>), Status> {
    parse_addr_reply(buf, Rtype::AAAA)
}

fn parse_addr_reply(
    buf: &[u8],
    rtype: Rtype,
) -> Result<(HostEnt, Vec<AddrTtl>), Status> {
    let (msg, question) = open(buf)?;
    let mut hostname = question.qname;
    let mut aliases = Vec::new();
    let mut cname_ttl = u32::MAX;
    let mut addrs = Vec::new();

    for record in msg.answer()? {
        let record = record?;
        if record.class() != Class::IN
            || !record.owner().eq_ignore_ascii_case(&hostname)
        {
            continue;
        }
        if record.rtype() == rtype {
            // Records of the wrong size are skipped, not rejected.
            let addr = match decode_addr(record.data()) {
                Some(addr) if rtype == Rtype::A && addr.is_ipv4() => addr,
                Some(addr) if rtype == Rtype::AAAA && addr.is_ipv6() => addr,
                _ => continue,
            };
            addrs.push(AddrTtl {
                addr,
                ttl: record.ttl().min(cname_ttl),
            });
        } else if record.rtype() == Rtype::CNAME {
            let target = rdata_name(&record)?;
            aliases.push(record.owner().to_string());
            cname_ttl = cname_ttl.min(record.ttl());
            hostname = target;
        }
    }

    if addrs.is_empty() && aliases.is_empty() {
        return Err(Status::NoData);
    }
    let host = HostEnt {
        name: hostname,
        aliases,
        addrs: addrs.iter().map(|item| item.addr).collect(),
    };
    Ok((host, addrs))
}

fn decode_addr(data: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(data) {
        Some(Ipv4Addr::from(octets).into())
    } else if let Ok(octets) = <[u8; 16]>::try_from(data) {
        Some(Ipv6Addr::from(octets).into())
    } else {
        None
    }
}

//------------ Name records --------------------------------------------------

/// Decodes the NS records of a response.
///
/// The host entry carries the question name and the name servers as
/// aliases.
pub fn parse_ns_reply(buf: &[u8]) -> Result<HostEnt, Status> {
    let (msg, question) = open(buf)?;
    let aliases = collect(&msg, Rtype::NS, rdata_name)?;
    Ok(HostEnt {
        name: question.qname,
        aliases,
        addrs: Vec::new(),
    })
}

/// Decodes the PTR records of a response.
///
/// CNAME records redirect to the name the PTR records are expected at.
/// All pointer targets are returned as aliases and the last one as the
/// name. If an address is given, it becomes the address of the entry.
pub fn parse_ptr_reply(
    buf: &[u8],
    addr: Option<IpAddr>,
) -> Result<HostEnt, Status> {
    let (msg, question) = open(buf)?;
    let mut ptrname = question.qname;
    let mut hostname = None;
    let mut aliases = Vec::new();

    for record in msg.answer()? {
        let record = record?;
        if record.class() != Class::IN {
            continue;
        }
        if record.rtype() == Rtype::PTR
            && record.owner().eq_ignore_ascii_case(&ptrname)
        {
            let target = rdata_name(&record)?;
            aliases.push(target.clone());
            hostname = Some(target);
        } else if record.rtype() == Rtype::CNAME {
            ptrname = rdata_name(&record)?;
        }
    }

    match hostname {
        Some(name) => Ok(HostEnt {
            name,
            aliases,
            addrs: addr.into_iter().collect(),
        }),
        None => Err(Status::NoData),
    }
}

//------------ Structured records --------------------------------------------

/// Decodes the MX records of a response.
pub fn parse_mx_reply(buf: &[u8]) -> Result<Vec<Mx>, Status> {
    let (msg, _) = open(buf)?;
    collect(&msg, Rtype::MX, |record| {
        let mut parser = record.data_parser();
        let priority = parser.parse_u16_be().map_err(ParseError::from)?;
        let exchange = expand_name(&mut parser)?;
        check_end(record, &parser)?;
        Ok(Mx { exchange, priority })
    })
}

/// Decodes the TXT records of a response into their character strings.
///
/// The first string of each record is marked as such.
pub fn parse_txt_reply(buf: &[u8]) -> Result<Vec<TxtChunk>, Status> {
    let (msg, _) = open(buf)?;
    let mut res = Vec::new();
    for record in msg.answer()? {
        let record = record?;
        if record.class() != Class::IN || record.rtype() != Rtype::TXT {
            continue;
        }
        let mut parser = Parser::from_ref(record.data());
        let mut record_start = true;
        while parser.remaining() > 0 {
            res.push(TxtChunk {
                data: parse_charstr(&mut parser)?,
                record_start,
            });
            record_start = false;
        }
    }
    if res.is_empty() {
        Err(Status::NoData)
    } else {
        Ok(res)
    }
}

/// Decodes the SRV records of a response.
pub fn parse_srv_reply(buf: &[u8]) -> Result<Vec<Srv>, Status> {
    let (msg, _) = open(buf)?;
    collect(&msg, Rtype::SRV, |record| {
        let mut parser = record.data_parser();
        let priority = parser.parse_u16_be().map_err(ParseError::from)?;
        let weight = parser.parse_u16_be().map_err(ParseError::from)?;
        let port = parser.parse_u16_be().map_err(ParseError::from)?;
        let name = expand_name(&mut parser)?;
        check_end(record, &parser)?;
        Ok(Srv {
            name,
            port,
            priority,
            weight,
        })
    })
}

/// Decodes the NAPTR records of a response.
pub fn parse_naptr_reply(buf: &[u8]) -> Result<Vec<Naptr>, Status> {
    let (msg, _) = open(buf)?;
    collect(&msg, Rtype::NAPTR, |record| {
        let mut parser = record.data_parser();
        let order = parser.parse_u16_be().map_err(ParseError::from)?;
        let preference = parser.parse_u16_be().map_err(ParseError::from)?;
        let flags = parse_charstr(&mut parser)?;
        let service = parse_charstr(&mut parser)?;
        let regexp = parse_charstr(&mut parser)?;
        let replacement = expand_name(&mut parser)?;
        check_end(record, &parser)?;
        Ok(Naptr {
            flags: lossy(&flags),
            service: lossy(&service),
            regexp: lossy(&regexp),
            replacement,
            order,
            preference,
        })
    })
}

/// Decodes the CAA records of a response.
pub fn parse_caa_reply(buf: &[u8]) -> Result<Vec<Caa>, Status> {
    let (msg, _) = open(buf)?;
    collect(&msg, Rtype::CAA, |record| {
        let mut parser = Parser::from_ref(record.data());
        let critical = parser.parse_u8()?;
        let tag_len = usize::from(parser.parse_u8()?);
        if tag_len == 0 {
            return Err(ParseError::form_error("empty CAA property"));
        }
        let property = lossy(parser.peek(tag_len)?);
        parser.advance(tag_len)?;
        let value = Bytes::copy_from_slice(parser.peek_all());
        Ok(Caa {
            critical,
            property,
            value,
        })
    })
}

/// Decodes the first SOA record of a response.
pub fn parse_soa_reply(buf: &[u8]) -> Result<Soa, Status> {
    let (msg, _) = open(buf)?;
    let mut soa = collect(&msg, Rtype::SOA, |record| {
        let mut parser = record.data_parser();
        let nsname = expand_name(&mut parser)?;
        let hostmaster = expand_name(&mut parser)?;
        let soa = Soa {
            nsname,
            hostmaster,
            serial: parser.parse_u32_be()?,
            refresh: parser.parse_u32_be()?,
            retry: parser.parse_u32_be()?,
            expire: parser.parse_u32_be()?,
            minttl: parser.parse_u32_be()?,
        };
        check_end(record, &parser)?;
        Ok(soa)
    })?;
    Ok(soa.swap_remove(0))
}

//------------ Helpers -------------------------------------------------------

/// Checks the basic shape of a response.
fn open(buf: &[u8]) -> Result<(Message, Question), Status> {
    let msg = Message::from_slice(buf)?;
    if msg.counts().qdcount != 1 {
        return Err(Status::BadResp);
    }
    let question = msg.first_question()?;
    if msg.counts().ancount == 0 {
        return Err(Status::NoData);
    }
    Ok((msg, question))
}

/// Decodes all answer records of the given type.
fn collect<'a, T, F>(
    msg: &Message<'a>,
    rtype: Rtype,
    mut op: F,
) -> Result<Vec<T>, Status>
where
    F: FnMut(&ParsedRecord<'a>) -> Result<T, ParseError>,
{
    let mut res = Vec::new();
    for record in msg.answer()? {
        let record = record?;
        if record.class() == Class::IN && record.rtype() == rtype {
            res.push(op(&record)?);
        }
    }
    if res.is_empty() {
        Err(Status::NoData)
    } else {
        Ok(res)
    }
}

fn rdata_name(record: &ParsedRecord) -> Result<String, ParseError> {
    let mut parser = record.data_parser();
    let name = expand_name(&mut parser)?;
    check_end(record, &parser)?;
    Ok(name)
}

fn check_end(
    record: &ParsedRecord,
    parser: &Parser<[u8]>,
) -> Result<(), ParseError> {
    if parser.pos() > record.data_end() {
        Err(ParseError::form_error("record data overrun"))
    } else {
        Ok(())
    }
}

fn parse_charstr(parser: &mut Parser<[u8]>) -> Result<Bytes, ParseError> {
    let len = usize::from(parser.parse_u8()?);
    let res = Bytes::copy_from_slice(parser.peek(len)?);
    parser.advance(len)?;
    Ok(res)
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::testing::ResponseBuilder;

    #[test]
    fn a_with_cname_chain() {
        let buf = ResponseBuilder::new("www.example.com", Rtype::A)
            .record(
                "www.example.com",
                Rtype::CNAME,
                60,
                &crate::base::testing::wire_name("web.example.com"),
            )
            .a("web.example.com", "192.0.2.1", 300)
            .a("other.example.com", "192.0.2.9", 300)
            .a("WEB.example.com", "192.0.2.2", 30)
            .finish();
        let (host, ttls) = parse_a_reply(&buf).unwrap();
        assert_eq!(host.name, "web.example.com");
        assert_eq!(host.aliases, ["www.example.com"]);
        assert_eq!(
            ttls,
            [
                AddrTtl {
                    addr: "192.0.2.1".parse().unwrap(),
                    ttl: 60
                },
                AddrTtl {
                    addr: "192.0.2.2".parse().unwrap(),
                    ttl: 30
                },
            ]
        );
        assert_eq!(host.addrs.len(), 2);
    }

    #[test]
    fn a_without_records() {
        let buf = ResponseBuilder::new("example.com", Rtype::A).finish();
        assert_eq!(parse_a_reply(&buf), Err(Status::NoData));

        let buf = ResponseBuilder::new("example.com", Rtype::A)
            .mx("example.com", 10, "mail.example.com")
            .finish();
        assert_eq!(parse_a_reply(&buf), Err(Status::NoData));
    }

    #[test]
    fn aaaa() {
        let buf = ResponseBuilder::new("example.com", Rtype::AAAA)
            .a("example.com", "192.0.2.1", 300)
            .aaaa("example.com", "2001:db8::1", 300)
            .finish();
        let (host, ttls) = parse_aaaa_reply(&buf).unwrap();
        assert_eq!(host.addrs, ["2001:db8::1".parse::<IpAddr>().unwrap()]);
        assert_eq!(ttls.len(), 1);
    }

    #[test]
    fn ns_and_ptr() {
        let buf = ResponseBuilder::new("example.com", Rtype::NS)
            .ns("example.com", "a.iana-servers.net")
            .ns("example.com", "b.iana-servers.net")
            .finish();
        let host = parse_ns_reply(&buf).unwrap();
        assert_eq!(host.name, "example.com");
        assert_eq!(host.aliases, ["a.iana-servers.net", "b.iana-servers.net"]);

        let buf = ResponseBuilder::new("1.2.0.192.in-addr.arpa", Rtype::PTR)
            .cname("1.2.0.192.in-addr.arpa", "1.0/25.2.0.192.in-addr.arpa")
            .ptr("1.0/25.2.0.192.in-addr.arpa", "host.example.com")
            .finish();
        let addr = "192.0.2.1".parse().unwrap();
        let host = parse_ptr_reply(&buf, Some(addr)).unwrap();
        assert_eq!(host.name, "host.example.com");
        assert_eq!(host.aliases, ["host.example.com"]);
        assert_eq!(host.addrs, [addr]);
    }

    #[test]
    fn mx_srv_naptr() {
        let buf = ResponseBuilder::new("example.com", Rtype::ANY)
            .mx("example.com", 10, "mx1.example.com")
            .srv("example.com", 1, 2, 5060, "sip.example.com")
            .naptr("example.com", 100, 10, b"u", b"E2U+sip", b"!^.*$!x!", ".")
            .finish();
        assert_eq!(
            parse_mx_reply(&buf).unwrap(),
            [Mx {
                exchange: "mx1.example.com".into(),
                priority: 10
            }]
        );
        assert_eq!(
            parse_srv_reply(&buf).unwrap(),
            [Srv {
                name: "sip.example.com".into(),
                port: 5060,
                priority: 1,
                weight: 2
            }]
        );
        assert_eq!(
            parse_naptr_reply(&buf).unwrap(),
            [Naptr {
                flags: "u".into(),
                service: "E2U+sip".into(),
                regexp: "!^.*$!x!".into(),
                replacement: "".into(),
                order: 100,
                preference: 10
            }]
        );
    }

    #[test]
    fn txt_chunks() {
        let buf = ResponseBuilder::new("example.com", Rtype::TXT)
            .txt("example.com", &[b"v=spf1", b" -all"])
            .txt("example.com", &[b"hello"])
            .finish();
        let chunks = parse_txt_reply(&buf).unwrap();
        let starts: Vec<_> =
            chunks.iter().map(|chunk| chunk.record_start).collect();
        assert_eq!(starts, [true, false, true]);
        assert_eq!(chunks[1].data.as_ref(), b" -all");
    }

    #[test]
    fn caa_and_soa() {
        let buf = ResponseBuilder::new("example.com", Rtype::ANY)
            .caa("example.com", 128, "issue", b"ca.example.net")
            .soa(
                "example.com",
                "ns.example.com",
                "hostmaster.example.com",
                [2024010101, 7200, 3600, 1209600, 300],
            )
            .finish();
        assert_eq!(
            parse_caa_reply(&buf).unwrap(),
            [Caa {
                critical: 128,
                property: "issue".into(),
                value: Bytes::from_static(b"ca.example.net"),
            }]
        );
        let soa = parse_soa_reply(&buf).unwrap();
        assert_eq!(soa.nsname, "ns.example.com");
        assert_eq!(soa.hostmaster, "hostmaster.example.com");
        assert_eq!(soa.serial, 2024010101);
        assert_eq!(soa.minttl, 300);
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_mx_reply(b"\x00\x01"), Err(Status::BadResp));

        // Two questions.
        let mut buf = ResponseBuilder::new("example.com", Rtype::MX)
            .mx("example.com", 10, "mx.example.com")
            .finish();
        buf[5] = 2;
        assert_eq!(parse_mx_reply(&buf), Err(Status::BadResp));

        // Truncated record data.
        let buf = ResponseBuilder::new("example.com", Rtype::MX)
            .record("example.com", Rtype::MX, 300, b"\x00")
            .finish();
        assert_eq!(parse_mx_reply(&buf), Err(Status::BadResp));

        // A name running past the record data.
        let buf = ResponseBuilder::new("example.com", Rtype::NS)
            .record("example.com", Rtype::NS, 300, b"\x02ns")
            .finish();
        assert_eq!(parse_ns_reply(&buf), Err(Status::BadResp));

        // A character string longer than the data.
        let buf = ResponseBuilder::new("example.com", Rtype::TXT)
            .record("example.com", Rtype::TXT, 300, b"\x05abc")
            .finish();
        assert_eq!(parse_txt_reply(&buf), Err(Status::BadResp));

        // A CAA property longer than the data.
        let buf = ResponseBuilder::new("example.com", Rtype::CAA)
            .record("example.com", Rtype::CAA, 300, b"\x00\x09issue")
            .finish();
        assert_eq!(parse_caa_reply(&buf), Err(Status::BadResp));
    }
}
