//! DNS response codes.
//!
//! The original DNS specification in [RFC 1035] specified four bits of the
//! message header as response code. Only these four bits are of interest
//! here: the engine maps them onto a [`Status`] once an answer arrives.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035
//! [`Status`]: crate::status::Status

//------------ Rcode --------------------------------------------------------

int_enum! {
    /// DNS Response Codes.
    ///
    /// The response code of a response indicates what happend on the server
    /// when trying to answer the query. The code is a 4 bit value and part
    /// of the header of a DNS message.
    =>
    Rcode, u8, "RCODE";

    /// No error condition.
    (NOERROR => 0, "NOERROR")

    /// The name server was unable to interpret the query.
    (FORMERR => 1, "FORMERR")

    /// The name server was unable to process this query due to a problem
    /// with the name server.
    (SERVFAIL => 2, "SERVFAIL")

    /// The domain name given in the query does not exist at the name server.
    (NXDOMAIN => 3, "NXDOMAIN")

    /// The name server does not support the requested kind of query.
    (NOTIMP => 4, "NOTIMP")

    /// The name server refused to perform the operation.
    (REFUSED => 5, "REFUSED")
}
