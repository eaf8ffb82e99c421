//! Parsing responses into the results of queries.
//!
//! These functions sit on top of the decoders in
//! [`engine::decode`](crate::engine::decode) and shape their output into
//! what a query returns. [`Status::NoData`] is passed through as an error
//! here. The query layer turns it into [`Answer::NoData`](crate::Answer).

use crate::base::header::HEADER_LEN;
use crate::base::iana::Rtype;
use crate::base::message::{QUESTION_FIXED_LEN, RECORD_FIXED_LEN};
use crate::base::name::expand_name;
use crate::base::wire::ParseError;
use crate::engine::decode::{self, TxtChunk};
use crate::record::{AddrTtl, AnyRecord, Caa, Mx, Naptr, Soa, Srv, Txt};
use crate::status::Status;
use bytes::Bytes;
use octseq::parse::Parser;

//------------ General replies -----------------------------------------------

/// The record types handled by [`parse_general`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeneralType {
    A,
    Aaaa,
    Cname,
    Ns,
    Ptr,

    /// A CNAME if the response has one, plain A records otherwise.
    CnameOrA,
}

/// The result of [`parse_general`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum General {
    Addrs(Vec<AddrTtl>),
    Cname(String),
    Names(Vec<String>),
}

/// Parses responses carrying addresses or names.
///
/// For [`GeneralType::Cname`] and for [`GeneralType::CnameOrA`] if the
/// response follows an alias, the result is the canonical name only.
/// Otherwise A and AAAA produce the addresses and NS and PTR the names.
pub fn parse_general(buf: &[u8], gtype: GeneralType) -> Result<General, Status> {
    match gtype {
        GeneralType::A | GeneralType::Aaaa => {
            let (_, addrs) = if gtype == GeneralType::A {
                decode::parse_a_reply(buf)?
            } else {
                decode::parse_aaaa_reply(buf)?
            };
            if addrs.is_empty() {
                return Err(Status::NoData);
            }
            Ok(General::Addrs(addrs))
        }
        GeneralType::Cname | GeneralType::CnameOrA => {
            let (host, addrs) = decode::parse_a_reply(buf)?;
            if !host.aliases.is_empty() {
                Ok(General::Cname(host.name))
            } else if gtype == GeneralType::CnameOrA {
                Ok(General::Addrs(addrs))
            } else {
                Err(Status::NoData)
            }
        }
        GeneralType::Ns => {
            Ok(General::Names(decode::parse_ns_reply(buf)?.aliases))
        }
        GeneralType::Ptr => {
            Ok(General::Names(decode::parse_ptr_reply(buf, None)?.aliases))
        }
    }
}

//------------ Structured replies --------------------------------------------

pub fn parse_mx(buf: &[u8]) -> Result<Vec<Mx>, Status> {
    decode::parse_mx_reply(buf)
}

/// Parses TXT records, keeping the strings of each record together.
pub fn parse_txt(buf: &[u8]) -> Result<Vec<Txt>, Status> {
    decode::parse_txt_reply(buf).map(group_txt)
}

/// Groups a sequence of TXT chunks into records.
///
/// A new record begins at every chunk marked as record start.
pub fn group_txt(chunks: Vec<TxtChunk>) -> Vec<Txt> {
    let mut res = Vec::new();
    let mut current: Option<Vec<Bytes>> = None;
    for chunk in chunks {
        if chunk.record_start {
            if let Some(done) = current.take() {
                res.push(Txt::new(done));
            }
        }
        current.get_or_insert_with(Vec::new).push(chunk.data);
    }
    if let Some(done) = current {
        res.push(Txt::new(done));
    }
    res
}

pub fn parse_srv(buf: &[u8]) -> Result<Vec<Srv>, Status> {
    decode::parse_srv_reply(buf)
}

pub fn parse_naptr(buf: &[u8]) -> Result<Vec<Naptr>, Status> {
    decode::parse_naptr_reply(buf)
}

pub fn parse_caa(buf: &[u8]) -> Result<Vec<Caa>, Status> {
    decode::parse_caa_reply(buf)
}

/// Parses the response to an SOA query.
pub fn parse_soa(buf: &[u8]) -> Result<Soa, Status> {
    decode::parse_soa_reply(buf)
}

//------------ parse_soa_any -------------------------------------------------

/// Finds the first SOA record in the answer section of any response.
///
/// Walks the message directly: skips the header and the first question,
/// then goes over the answer records until it finds one of type SOA.
/// The number of questions is not checked. Any problem along the way is
/// reported as [`Status::BadResp`]. If there is no SOA record, returns
/// `Ok(None)`.
pub fn parse_soa_any(buf: &[u8]) -> Result<Option<Soa>, Status> {
    walk_soa(buf).map_err(Status::from)
}

fn walk_soa(buf: &[u8]) -> Result<Option<Soa>, ParseError> {
    let mut parser = Parser::from_ref(buf);
    parser.seek(6)?;
    let ancount = parser.parse_u16_be()?;

    parser.seek(HEADER_LEN)?;
    expand_name(&mut parser)?;
    parser.advance(QUESTION_FIXED_LEN)?;

    for _ in 0..ancount {
        expand_name(&mut parser)?;
        let mut fixed = [0u8; RECORD_FIXED_LEN];
        parser.parse_buf(&mut fixed)?;
        let rtype = Rtype::from_int(u16::from_be_bytes([fixed[0], fixed[1]]));
        let rdlen = u16::from_be_bytes([fixed[8], fixed[9]]);

        if rtype == Rtype::SOA {
            let nsname = expand_name(&mut parser)?;
            let hostmaster = expand_name(&mut parser)?;
            return Ok(Some(Soa {
                nsname,
                hostmaster,
                serial: parser.parse_u32_be()?,
                refresh: parser.parse_u32_be()?,
                retry: parser.parse_u32_be()?,
                expire: parser.parse_u32_be()?,
                minttl: parser.parse_u32_be()?,
            }));
        }
        parser.advance(usize::from(rdlen))?;
    }
    Ok(None)
}

//------------ parse_any -----------------------------------------------------

/// Parses the response to an ANY query.
///
/// The records are collected type by type in a fixed order: A or CNAME,
/// AAAA, MX, NS, TXT, SRV, PTR, NAPTR, SOA, CAA. A type without records
/// contributes nothing. Any other failure fails the whole response, except
/// for SRV and PTR: a failure to parse those is ignored and they
/// contribute nothing.
pub fn parse_any(buf: &[u8]) -> Result<Vec<AnyRecord>, Status> {
    let mut res = Vec::new();

    match no_data_ok(parse_general(buf, GeneralType::CnameOrA))? {
        Some(General::Cname(name)) => res.push(AnyRecord::Cname(name)),
        Some(General::Addrs(addrs)) => {
            res.extend(addrs.into_iter().map(AnyRecord::A))
        }
        Some(General::Names(_)) | None => {}
    }
    if let Some(General::Addrs(addrs)) =
        no_data_ok(parse_general(buf, GeneralType::Aaaa))?
    {
        res.extend(addrs.into_iter().map(AnyRecord::Aaaa));
    }
    extend(&mut res, parse_mx(buf), AnyRecord::Mx)?;
    if let Some(General::Names(names)) =
        no_data_ok(parse_general(buf, GeneralType::Ns))?
    {
        res.extend(names.into_iter().map(AnyRecord::Ns));
    }
    extend(&mut res, parse_txt(buf), AnyRecord::Txt)?;

    // SRV and PTR are deliberately lenient.
    if let Ok(srv) = parse_srv(buf) {
        res.extend(srv.into_iter().map(AnyRecord::Srv));
    }
    if let Ok(General::Names(names)) = parse_general(buf, GeneralType::Ptr) {
        res.extend(names.into_iter().map(AnyRecord::Ptr));
    }

    extend(&mut res, parse_naptr(buf), AnyRecord::Naptr)?;
    if let Some(soa) = parse_soa_any(buf)? {
        res.push(AnyRecord::Soa(soa));
    }
    extend(&mut res, parse_caa(buf), AnyRecord::Caa)?;
    Ok(res)
}

fn no_data_ok<T>(res: Result<T, Status>) -> Result<Option<T>, Status> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(Status::NoData) => Ok(None),
        Err(err) => Err(err),
    }
}

fn extend<T>(
    target: &mut Vec<AnyRecord>,
    res: Result<Vec<T>, Status>,
    op: fn(T) -> AnyRecord,
) -> Result<(), Status> {
    if let Some(items) = no_data_ok(res)? {
        target.extend(items.into_iter().map(op));
    }
    Ok(())
}

//============ Testing =======================================================
