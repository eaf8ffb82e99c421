//! Resource Record (RR) TYPEs

use crate::base::wire::ParseError;
use octseq::parse::Parser;

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource records has a 16 bit type value indicating what kind of
    /// information is represented by the record. Normal query includes the
    /// type of record information is requested for. A few aditional types,
    /// called query types, are defined as well and can only be used in
    /// questions. This type represents both these types.
    ///
    /// Only the types the channel can query for or has to recognize while
    /// walking a response have constants. The currently assigned values are
    /// maintained in an [IANA registry].
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16, "TYPE";

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    (AAAA => 28, "AAAA")

    /// Server selection.
    (SRV => 33, "SRV")

    /// Naming authority pointer.
    (NAPTR => 35, "NAPTR")

    /// A request for all records the server/cache has available.
    (ANY => 255, "ANY")

    /// Certification Authority Restriction.
    (CAA => 257, "CAA")
}

impl Rtype {
    /// Takes a record type from the beginning of a parser.
    pub fn parse<Octs: AsRef<[u8]> + ?Sized>(
        parser: &mut Parser<Octs>,
    ) -> Result<Self, ParseError> {
        parser.parse_u16_be().map(Self::from_int).map_err(Into::into)
    }
}

//============ Testing =======================================================
