//! The resolution channel.
//!
//! A [`Channel`] owns one resolver engine and connects it to the event
//! loop. It registers the sockets the engine announces through its socket
//! state callback, hands readiness back to the engine, and runs an idle
//! timer while any socket is registered so the engine can handle
//! timeouts.
//!
//! Channels are single threaded. They must be created and used from
//! within a [`LocalSet`](tokio::task::LocalSet) on a runtime with IO and
//! time enabled.
//!
//! ```no_run
//! use resolv_channel::{Answer, Channel, ChannelOptions};
//! use tokio::task::LocalSet;
//!
//! # async fn run() -> Result<(), resolv_channel::Error> {
//! LocalSet::new().run_until(async {
//!     let channel = Channel::new(ChannelOptions::default())?;
//!     if let Answer::Found(addrs) = channel.query_a("example.com").await? {
//!         for item in addrs {
//!             println!("{} (ttl {})", item.addr, item.ttl);
//!         }
//!     }
//!     Ok(())
//! }).await
//! # }
//! ```

use crate::engine::stub::StubFactory;
use crate::engine::{Engine, EngineFactory, EngineOptions, ServerAddr};
use crate::error::Error;
use crate::library::{Library, LibraryRef};
use crate::query::{kinds, Kind, Query, ResolveFuture};
use crate::record::{AddrTtl, AnyRecord, Caa, Mx, Naptr, Soa, Srv, Txt};
use crate::status::Status;
use self::task::Task;
use self::tick::{Job, TickQueue};
use self::timer::IdleTimer;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};
use std::fmt;
use tracing::{debug, trace, warn};

mod task;
mod tick;
mod timer;

//------------ ChannelOptions ------------------------------------------------

/// Options for creating a channel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelOptions {
    /// The timeout of a single attempt in milliseconds.
    ///
    /// If `None`, the engine’s default applies.
    pub timeout: Option<u32>,

    /// The number of attempts per server.
    pub tries: Option<u32>,
}

//------------ Server --------------------------------------------------------

/// A name server as seen by users of a channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Server {
    /// The address family, either 4 or 6.
    pub family: u8,

    /// The address in its textual form.
    pub address: String,

    /// The port, zero meaning the default.
    pub port: u16,
}

impl Server {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Server {
            family: if addr.is_ipv4() { 4 } else { 6 },
            address: addr.to_string(),
            port,
        }
    }

    fn to_server_addr(&self) -> Result<ServerAddr, Error> {
        let addr = match self.family {
            4 => self.address.parse::<Ipv4Addr>().map(IpAddr::V4),
            6 => self.address.parse::<Ipv6Addr>().map(IpAddr::V6),
            _ => return Err(Error::InvalidArgument("bad address family")),
        };
        match addr {
            Ok(addr) => Ok(ServerAddr::new(addr, self.port)),
            Err(_) => Err(Error::Resolve(Status::BadStr)),
        }
    }
}

impl From<ServerAddr> for Server {
    fn from(addr: ServerAddr) -> Self {
        Server::new(addr.addr, addr.udp_port)
    }
}

//------------ Channel -------------------------------------------------------

/// A resolution context.
///
/// Queries are sent as soon as the query method is called. The returned
/// future resolves once the answer has arrived and was parsed. Dropping
/// the future abandons the query.
///
/// Dropping the channel tears down its engine once all queries still
/// referring to it are done.
pub struct Channel {
    inner: Rc<ChannelInner>,
}

impl Channel {
    /// Creates a channel using the UDP stub engine.
    ///
    /// The engine is configured from the system’s resolver configuration.
    pub fn new(options: ChannelOptions) -> Result<Self, Error> {
        Self::with_factory(options, Rc::new(StubFactory::new()))
    }

    /// Creates a channel with an engine from the given factory.
    pub fn with_factory(
        options: ChannelOptions,
        factory: Rc<dyn EngineFactory>,
    ) -> Result<Self, Error> {
        Self::with_library(options, factory, Library::global())
    }

    pub(crate) fn with_library(
        options: ChannelOptions,
        factory: Rc<dyn EngineFactory>,
        library: &'static Library,
    ) -> Result<Self, Error> {
        let library = library.acquire(factory.clone()).map_err(Error::Init)?;
        let inner = Rc::new_cyclic(|weak| ChannelInner {
            weak: weak.clone(),
            engine: RefCell::new(None),
            factory,
            tasks: RefCell::new(HashMap::new()),
            timer: IdleTimer::new(options.timeout),
            ticks: TickQueue::new(),
            active_query_count: Cell::new(0),
            servers_default: Cell::new(true),
            query_last_ok: Cell::new(true),
            options,
            _library: library,
        });
        let engine = inner
            .factory
            .create(inner.engine_options())
            .map_err(Error::Init)?;
        *inner.engine.borrow_mut() = Some(engine);
        Ok(Channel { inner })
    }

    //--- Queries

    pub fn query_any(&self, name: &str) -> ResolveFuture<Vec<AnyRecord>> {
        self.dispatch(kinds::ANY, name)
    }

    pub fn query_a(&self, name: &str) -> ResolveFuture<Vec<AddrTtl>> {
        self.dispatch(kinds::A, name)
    }

    pub fn query_aaaa(&self, name: &str) -> ResolveFuture<Vec<AddrTtl>> {
        self.dispatch(kinds::AAAA, name)
    }

    pub fn query_caa(&self, name: &str) -> ResolveFuture<Vec<Caa>> {
        self.dispatch(kinds::CAA, name)
    }

    /// Queries the canonical name of an alias.
    pub fn query_cname(&self, name: &str) -> ResolveFuture<Vec<String>> {
        self.dispatch(kinds::CNAME, name)
    }

    pub fn query_mx(&self, name: &str) -> ResolveFuture<Vec<Mx>> {
        self.dispatch(kinds::MX, name)
    }

    pub fn query_ns(&self, name: &str) -> ResolveFuture<Vec<String>> {
        self.dispatch(kinds::NS, name)
    }

    pub fn query_txt(&self, name: &str) -> ResolveFuture<Vec<Txt>> {
        self.dispatch(kinds::TXT, name)
    }

    pub fn query_srv(&self, name: &str) -> ResolveFuture<Vec<Srv>> {
        self.dispatch(kinds::SRV, name)
    }

    pub fn query_ptr(&self, name: &str) -> ResolveFuture<Vec<String>> {
        self.dispatch(kinds::PTR, name)
    }

    pub fn query_naptr(&self, name: &str) -> ResolveFuture<Vec<Naptr>> {
        self.dispatch(kinds::NAPTR, name)
    }

    pub fn query_soa(&self, name: &str) -> ResolveFuture<Soa> {
        self.dispatch(kinds::SOA, name)
    }

    /// Looks up the host names of an address given in its textual form.
    ///
    /// Fails with [`Error::InvalidArgument`] if `addr` isn’t an IPv4 or
    /// IPv6 address.
    pub fn get_host_by_addr(&self, addr: &str) -> ResolveFuture<Vec<String>> {
        self.dispatch(kinds::REVERSE, addr)
    }

    fn dispatch<T>(&self, kind: Kind<T>, name: &str) -> ResolveFuture<T> {
        Query::dispatch(&self.inner, kind, name)
    }

    //--- Configuration

    /// Returns the name servers in use.
    pub fn servers(&self) -> Result<Vec<Server>, Error> {
        let servers = self.inner.with_engine(|engine| Ok(engine.servers()))?;
        Ok(servers.into_iter().map(Server::from).collect())
    }

    /// Replaces the name servers.
    ///
    /// This is refused with [`Status::ServersPending`] while queries are
    /// outstanding.
    pub fn set_servers(&self, servers: &[Server]) -> Result<(), Error> {
        if self.inner.active_query_count.get() > 0 {
            return Err(Error::Resolve(Status::ServersPending));
        }
        let servers = servers
            .iter()
            .map(Server::to_server_addr)
            .collect::<Result<Vec<_>, _>>()?;
        self.inner
            .with_engine(|engine| engine.set_servers(&servers))?;
        self.inner.servers_default.set(false);
        debug!("name servers set explicitly");
        Ok(())
    }

    /// Sets the local addresses queries are sent from.
    ///
    /// At most one IPv4 and one IPv6 address can be given, in any order.
    /// The family not given goes back to the unspecified address.
    pub fn set_local_address(
        &self,
        first: &str,
        second: Option<&str>,
    ) -> Result<(), Error> {
        let first = parse_ip(first)?;
        let second = match second {
            Some(second) => Some(parse_ip(second)?),
            None => None,
        };
        let (v4, v6) = match (first, second) {
            (IpAddr::V4(_), Some(IpAddr::V4(_))) => {
                return Err(Error::InvalidArgument(
                    "cannot specify two IPv4 addresses",
                ))
            }
            (IpAddr::V6(_), Some(IpAddr::V6(_))) => {
                return Err(Error::InvalidArgument(
                    "cannot specify two IPv6 addresses",
                ))
            }
            (IpAddr::V4(v4), Some(IpAddr::V6(v6)))
            | (IpAddr::V6(v6), Some(IpAddr::V4(v4))) => (v4, v6),
            (IpAddr::V4(v4), None) => (v4, Ipv6Addr::UNSPECIFIED),
            (IpAddr::V6(v6), None) => (Ipv4Addr::UNSPECIFIED, v6),
        };
        self.inner.with_engine(|engine| {
            engine.set_local_ipv4(v4);
            engine.set_local_ipv6(v6);
            Ok(())
        })?;
        Ok(())
    }

    /// Fails all outstanding queries with [`Status::Cancelled`].
    pub fn cancel(&self) {
        let _ = self.inner.with_engine(|engine| {
            engine.cancel();
            Ok(())
        });
    }

    /// Returns the number of queries not yet completed by the engine.
    pub fn active_queries(&self) -> usize {
        self.inner.active_query_count.get()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel")
            .field("options", &self.inner.options)
            .field("active_queries", &self.active_queries())
            .field("sockets", &self.inner.tasks.borrow().len())
            .finish()
    }
}

fn parse_ip(addr: &str) -> Result<IpAddr, Error> {
    addr.parse()
        .map_err(|_| Error::InvalidArgument("invalid IP address"))
}

//------------ ChannelInner --------------------------------------------------

/// The shared state of a channel.
pub(crate) struct ChannelInner {
    weak: Weak<ChannelInner>,

    /// The engine. Only `None` while the channel is being set up.
    engine: RefCell<Option<Box<dyn Engine>>>,

    factory: Rc<dyn EngineFactory>,

    /// The sockets announced by the engine. The timer runs iff this isn’t
    /// empty.
    ///
    /// A socket the event loop refused to watch has no task. The engine
    /// only learns about it through the timer, so queries on it time out.
    tasks: RefCell<HashMap<RawFd, Option<Task>>>,

    timer: IdleTimer,
    ticks: TickQueue,
    active_query_count: Cell<usize>,

    /// Whether the servers are still those the engine picked itself.
    servers_default: Cell<bool>,

    /// Whether the last completed query reached a server.
    query_last_ok: Cell<bool>,

    options: ChannelOptions,
    _library: LibraryRef,
}

impl ChannelInner {
    fn engine_options(&self) -> EngineOptions {
        let weak = self.weak.clone();
        EngineOptions {
            no_check_response: true,
            timeout_ms: self.options.timeout,
            tries: self.options.tries,
            sock_state: Rc::new(move |fd, read, write| {
                if let Some(channel) = weak.upgrade() {
                    channel.sock_state(fd, read, write)
                }
            }),
        }
    }

    /// Runs an operation on the engine.
    pub(crate) fn with_engine<R>(
        &self,
        op: impl FnOnce(&mut dyn Engine) -> Result<R, Status>,
    ) -> Result<R, Status> {
        match self.engine.borrow_mut().as_mut() {
            Some(engine) => op(engine.as_mut()),
            None => Err(Status::NotInitialized),
        }
    }

    pub(crate) fn increment(&self) {
        self.active_query_count.set(self.active_query_count.get() + 1);
    }

    pub(crate) fn decrement(&self) {
        let count = self.active_query_count.get();
        assert!(count > 0, "active query count underflow");
        self.active_query_count.set(count - 1);
    }

    /// Accounts for the completion of a query.
    pub(crate) fn settle(&self, status: Status) {
        self.query_last_ok.set(status != Status::ConnRefused);
        self.decrement();
    }

    /// Runs a job on the next turn of the event loop.
    pub(crate) fn defer(&self, job: Job) {
        self.ticks.push(job)
    }

    /// Recreates the engine if it has been left with the fallback server.
    ///
    /// Only happens while the servers haven’t been set explicitly and the
    /// last query failed to reach its server. An engine configured before
    /// the network came up may only know the local fallback, while the
    /// system configuration has real servers by now.
    pub(crate) fn ensure_servers(&self) {
        if self.query_last_ok.get() || !self.servers_default.get() {
            return;
        }
        let servers = match self.with_engine(|engine| Ok(engine.servers())) {
            Ok(servers) => servers,
            Err(_) => return,
        };
        match servers.as_slice() {
            [] => {}
            [server] if server.is_fallback() => self.reinit(),
            _ => self.servers_default.set(false),
        }
    }

    /// Replaces the engine with a fresh one.
    fn reinit(&self) {
        debug!("reinitializing resolver engine");
        self.tasks.borrow_mut().clear();
        self.timer.stop();
        match self.factory.create(self.engine_options()) {
            Ok(engine) => {
                let old = self.engine.replace(Some(engine));
                drop(old);
            }
            Err(status) => {
                warn!("cannot reinitialize resolver engine: {}", status);
            }
        }
    }

    /// Processes a socket state change announced by the engine.
    fn sock_state(&self, fd: RawFd, read: bool, write: bool) {
        let mut tasks = self.tasks.borrow_mut();
        if read || write {
            if let Some(task) = tasks.get(&fd) {
                if let Some(task) = task {
                    task.set_interest(read, write);
                }
                return;
            }
            let task = match Task::spawn(fd, read, write, self.weak.clone()) {
                Ok(task) => Some(task),
                Err(err) => {
                    warn!(
                        "cannot watch socket {}, relying on timeouts: {}",
                        fd, err
                    );
                    None
                }
            };
            if tasks.is_empty() {
                self.start_timer();
            }
            tasks.insert(fd, task);
        }
        else {
            if tasks.remove(&fd).is_none() {
                debug!("ignoring close of unknown socket {}", fd);
            }
            if tasks.is_empty() {
                self.timer.stop();
            }
        }
    }

    fn start_timer(&self) {
        let weak = self.weak.clone();
        self.timer.start(move || {
            if let Some(channel) = weak.upgrade() {
                channel.on_timer();
            }
        });
    }

    fn on_timer(&self) {
        assert!(
            !self.tasks.borrow().is_empty(),
            "idle timer fired without registered sockets"
        );
        trace!("idle timer fired");
        self.process(None, None);
    }

    /// Processes readiness reported for a registered socket.
    pub(crate) fn socket_ready(&self, read: Option<RawFd>, write: Option<RawFd>) {
        self.timer.again();
        self.process(read, write);
    }

    fn process(&self, read: Option<RawFd>, write: Option<RawFd>) {
        let _ = self.with_engine(|engine| {
            engine.process(read, write);
            Ok(())
        });
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.tasks.get_mut().clear();
        self.timer.stop();
        self.engine.get_mut().take();
    }
}

//============ Testing =======================================================
