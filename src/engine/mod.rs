//! Resolver engines.
//!
//! An engine does the actual DNS work for a channel: it builds queries,
//! sends them over its own sockets, matches responses, and retransmits.
//! The channel only drives it. Whenever the engine wants to be told about
//! a socket becoming readable or writable, or is done with a socket, it
//! calls the socket state callback it was given at creation. The channel
//! then waits for readiness on the event loop and calls
//! [`Engine::process`]. It also calls `process` periodically without any
//! socket so the engine can deal with timeouts.
//!
//! Engines report results through callbacks. A callback may be invoked
//! from inside any of the engine's methods, including when the engine is
//! dropped, but at most once per query. Callbacks must not call back into
//! the engine.
//!
//! The crate ships with a UDP stub engine in [`stub`].

use crate::base::iana::{Class, Rtype};
use crate::status::Status;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::io::RawFd;
use std::rc::Rc;

pub mod conf;
pub mod decode;
pub mod stub;

#[cfg(test)]
pub(crate) mod mock;

//------------ Callbacks -----------------------------------------------------

/// Receives the outcome of a query.
///
/// The answer buffer is only valid during the call and is empty unless the
/// status is [`Status::Success`].
pub type AnswerCallback = Box<dyn FnOnce(Status, &[u8])>;

/// Receives the outcome of a reverse lookup.
pub type HostCallback = Box<dyn FnOnce(Status, Option<&HostEnt>)>;

/// Receives socket state changes: the socket, whether to wait for it
/// becoming readable, and whether to wait for it becoming writable.
///
/// If both flags are `false`, the engine is about to close the socket.
pub type SockStateCallback = Rc<dyn Fn(RawFd, bool, bool)>;

//------------ Engine --------------------------------------------------------

/// A resolver engine.
pub trait Engine {
    /// Starts a query.
    ///
    /// If the query cannot be started, an error is returned and the
    /// callback is dropped without being invoked.
    fn query(
        &mut self,
        name: &str,
        class: Class,
        rtype: Rtype,
        callback: AnswerCallback,
    ) -> Result<(), Status>;

    /// Starts a reverse lookup of an address.
    fn host_by_addr(
        &mut self,
        addr: IpAddr,
        callback: HostCallback,
    ) -> Result<(), Status>;

    /// Processes socket readiness and expired timeouts.
    ///
    /// The sockets are those that became readable or writable, if any.
    fn process(&mut self, read_fd: Option<RawFd>, write_fd: Option<RawFd>);

    /// Fails all outstanding queries with [`Status::Cancelled`].
    fn cancel(&mut self);

    /// Returns the configured servers in order.
    fn servers(&self) -> Vec<ServerAddr>;

    /// Replaces the configured servers.
    fn set_servers(&mut self, servers: &[ServerAddr]) -> Result<(), Status>;

    /// Sets the local address for IPv4 sockets.
    ///
    /// The unspecified address means any address.
    fn set_local_ipv4(&mut self, addr: Ipv4Addr);

    /// Sets the local address for IPv6 sockets.
    fn set_local_ipv6(&mut self, addr: Ipv6Addr);
}

//------------ EngineFactory -------------------------------------------------

/// Creates engines for channels.
///
/// The factory also provides the process-wide initialization and cleanup
/// of the engine’s library which [`Library`](crate::library::Library)
/// runs for the first and after the last channel.
pub trait EngineFactory {
    fn library_init(&self) -> Result<(), Status> {
        Ok(())
    }

    fn library_cleanup(&self) {}

    /// Creates a new engine.
    ///
    /// The engine reads the system configuration at this point.
    fn create(&self, options: EngineOptions) -> Result<Box<dyn Engine>, Status>;
}

//------------ EngineOptions -------------------------------------------------

/// Options for creating an engine.
#[derive(Clone)]
pub struct EngineOptions {
    /// Accept responses even if they don’t look like they answer the query.
    pub no_check_response: bool,

    /// The timeout for a single attempt in milliseconds.
    ///
    /// If `None`, the engine’s configured default applies.
    pub timeout_ms: Option<u32>,

    /// The number of attempts per server.
    pub tries: Option<u32>,

    pub sock_state: SockStateCallback,
}

//------------ ServerAddr ----------------------------------------------------

/// The address of a name server.
///
/// A port of zero means the default port 53.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ServerAddr {
    pub addr: IpAddr,
    pub udp_port: u16,
    pub tcp_port: u16,
}

impl ServerAddr {
    /// Creates a server address using the same port for UDP and TCP.
    pub fn new(addr: IpAddr, port: u16) -> Self {
        ServerAddr {
            addr,
            udp_port: port,
            tcp_port: port,
        }
    }

    /// Returns the server an engine falls back to without configuration.
    pub fn fallback() -> Self {
        ServerAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    /// Returns whether this is the fallback server.
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

//------------ HostEnt -------------------------------------------------------

/// A host entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostEnt {
    /// The official name of the host.
    pub name: String,

    /// Alternative names.
    pub aliases: Vec<String>,

    /// The addresses of the host.
    pub addrs: Vec<IpAddr>,
}
