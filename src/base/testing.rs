//! Building responses in tests.

use super::header::{HeaderSection, HEADER_LEN};
use super::iana::{Class, Rcode, Rtype};
use super::name::compose_name;

/// A compression pointer to the question name.
pub const QNAME_PTR: [u8; 2] = [0xC0, HEADER_LEN as u8];

/// Returns the uncompressed wire format of a name.
pub fn wire_name(name: &str) -> Vec<u8> {
    let mut res = Vec::new();
    compose_name(name, &mut res).unwrap();
    res
}

/// Builds a response with a single question and an answer section.
pub struct ResponseBuilder {
    section: HeaderSection,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(qname: &str, qtype: Rtype) -> Self {
        let mut section = HeaderSection::new();
        section.header_mut().set_qr(true);
        section.header_mut().set_rd(true);
        section.counts_mut().qdcount = 1;
        let mut body = wire_name(qname);
        body.extend_from_slice(&qtype.to_int().to_be_bytes());
        body.extend_from_slice(&Class::IN.to_int().to_be_bytes());
        ResponseBuilder { section, body }
    }

    pub fn id(mut self, id: u16) -> Self {
        self.section.header_mut().set_id(id);
        self
    }

    pub fn rcode(mut self, rcode: Rcode) -> Self {
        self.section.header_mut().set_rcode(rcode);
        self
    }

    /// Appends a record with the owner given in wire format.
    pub fn raw_record(
        mut self,
        owner: &[u8],
        rtype: Rtype,
        ttl: u32,
        data: &[u8],
    ) -> Self {
        self.body.extend_from_slice(owner);
        self.body.extend_from_slice(&rtype.to_int().to_be_bytes());
        self.body.extend_from_slice(&Class::IN.to_int().to_be_bytes());
        self.body.extend_from_slice(&ttl.to_be_bytes());
        self.body
            .extend_from_slice(&(data.len() as u16).to_be_bytes());
        self.body.extend_from_slice(data);
        self.section.counts_mut().ancount += 1;
        self
    }

    pub fn record(
        self,
        owner: &str,
        rtype: Rtype,
        ttl: u32,
        data: &[u8],
    ) -> Self {
        self.raw_record(&wire_name(owner), rtype, ttl, data)
    }

    pub fn a(self, owner: &str, addr: &str, ttl: u32) -> Self {
        let addr: std::net::Ipv4Addr = addr.parse().unwrap();
        self.record(owner, Rtype::A, ttl, &addr.octets())
    }

    pub fn aaaa(self, owner: &str, addr: &str, ttl: u32) -> Self {
        let addr: std::net::Ipv6Addr = addr.parse().unwrap();
        self.record(owner, Rtype::AAAA, ttl, &addr.octets())
    }

    pub fn cname(self, owner: &str, target: &str) -> Self {
        self.record(owner, Rtype::CNAME, 300, &wire_name(target))
    }

    pub fn ns(self, owner: &str, target: &str) -> Self {
        self.record(owner, Rtype::NS, 300, &wire_name(target))
    }

    pub fn ptr(self, owner: &str, target: &str) -> Self {
        self.record(owner, Rtype::PTR, 300, &wire_name(target))
    }

    pub fn mx(self, owner: &str, priority: u16, exchange: &str) -> Self {
        let mut data = priority.to_be_bytes().to_vec();
        data.extend_from_slice(&wire_name(exchange));
        self.record(owner, Rtype::MX, 300, &data)
    }

    pub fn txt(self, owner: &str, strings: &[&[u8]]) -> Self {
        let mut data = Vec::new();
        for s in strings {
            data.push(s.len() as u8);
            data.extend_from_slice(s);
        }
        self.record(owner, Rtype::TXT, 300, &data)
    }

    pub fn srv(
        self,
        owner: &str,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&priority.to_be_bytes());
        data.extend_from_slice(&weight.to_be_bytes());
        data.extend_from_slice(&port.to_be_bytes());
        data.extend_from_slice(&wire_name(target));
        self.record(owner, Rtype::SRV, 300, &data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn naptr(
        self,
        owner: &str,
        order: u16,
        preference: u16,
        flags: &[u8],
        service: &[u8],
        regexp: &[u8],
        replacement: &str,
    ) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&order.to_be_bytes());
        data.extend_from_slice(&preference.to_be_bytes());
        for s in [flags, service, regexp] {
            data.push(s.len() as u8);
            data.extend_from_slice(s);
        }
        data.extend_from_slice(&wire_name(replacement));
        self.record(owner, Rtype::NAPTR, 300, &data)
    }

    pub fn soa(
        self,
        owner: &str,
        nsname: &str,
        hostmaster: &str,
        times: [u32; 5],
    ) -> Self {
        let mut data = wire_name(nsname);
        data.extend_from_slice(&wire_name(hostmaster));
        for value in times {
            data.extend_from_slice(&value.to_be_bytes());
        }
        self.record(owner, Rtype::SOA, 300, &data)
    }

    pub fn caa(
        self,
        owner: &str,
        critical: u8,
        property: &str,
        value: &[u8],
    ) -> Self {
        let mut data = vec![critical, property.len() as u8];
        data.extend_from_slice(property.as_bytes());
        data.extend_from_slice(value);
        self.record(owner, Rtype::CAA, 300, &data)
    }

    pub fn finish(self) -> Vec<u8> {
        let mut res = Vec::with_capacity(HEADER_LEN + self.body.len());
        self.section.compose(&mut res);
        res.extend_from_slice(&self.body);
        res
    }
}
