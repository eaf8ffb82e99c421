//! A stub resolver engine using UDP.
//!
//! The engine sends each query to the configured name servers in order,
//! or spread over all of them if the configuration asks to rotate. Every
//! server gets one connected, non-blocking UDP socket that is opened when
//! a query is sent to the server and closed again once no outstanding
//! query waits for it.
//!
//! An attempt is abandoned after the configured timeout and the query
//! moves on to the next server. The timeout doubles with every full round
//! over all servers. Once each server has been tried the configured
//! number of times, the query fails with [`Status::Timeout`] or, if the
//! last server refused the connection, with [`Status::ConnRefused`].
//!
//! Truncated answers are returned as they are.

use super::conf::ResolvConf;
use super::decode::parse_ptr_reply;
use super::{
    AnswerCallback, Engine, EngineFactory, EngineOptions, HostCallback,
    HostEnt, ServerAddr, SockStateCallback,
};
use crate::base::iana::{Class, Rcode, Rtype};
use crate::base::message::{compose_query, Message, Question};
use crate::base::name::reverse_name;
use crate::status::Status;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// The port used for servers configured with port zero.
const DEFAULT_PORT: u16 = 53;

/// The size of the receive buffer.
const RECV_SIZE: usize = 65535;

/// The largest factor the attempt timeout is multiplied with.
const MAX_BACKOFF_SHIFT: u32 = 6;

//------------ StubFactory ---------------------------------------------------

/// Creates stub engines.
#[derive(Clone, Debug, Default)]
pub struct StubFactory {
    /// The configuration to use instead of the system configuration.
    conf: Option<ResolvConf>,
}

impl StubFactory {
    /// Creates a factory for engines using the system configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory for engines using the given configuration.
    pub fn with_conf(mut conf: ResolvConf) -> Self {
        conf.finalize();
        StubFactory { conf: Some(conf) }
    }
}

impl EngineFactory for StubFactory {
    fn create(
        &self,
        options: EngineOptions,
    ) -> Result<Box<dyn Engine>, Status> {
        let conf = match self.conf {
            Some(ref conf) => conf.clone(),
            None => ResolvConf::system(),
        };
        Ok(Box::new(StubEngine::new(conf, options)))
    }
}

//------------ StubEngine ----------------------------------------------------

/// A UDP stub resolver engine.
pub struct StubEngine {
    servers: Vec<ServerAddr>,
    timeout: Duration,

    /// The number of attempts per server.
    tries: usize,

    rotate: bool,
    no_check_response: bool,

    /// The server the next query starts with if rotating.
    next_server: usize,

    sockets: Sockets,
    pending: HashMap<u16, Pending>,

    /// Queries finished but not yet reported.
    done: Vec<Done>,

    recv_buf: Vec<u8>,
}

impl StubEngine {
    pub fn new(conf: ResolvConf, options: EngineOptions) -> Self {
        let timeout = match options.timeout_ms {
            Some(ms) => Duration::from_millis(ms.into()),
            None => conf.timeout,
        };
        let tries = match options.tries {
            Some(tries) => usize::try_from(tries).unwrap_or(usize::MAX),
            None => conf.attempts,
        };
        StubEngine {
            servers: conf.servers,
            timeout,
            tries: tries.max(1),
            rotate: conf.rotate,
            no_check_response: options.no_check_response,
            next_server: 0,
            sockets: Sockets::new(options.sock_state),
            pending: HashMap::new(),
            done: Vec::new(),
            recv_buf: vec![0; RECV_SIZE],
        }
    }

    /// Starts a query for the given question.
    fn start(
        &mut self,
        question: Question,
        completion: Completion,
    ) -> Result<(), Status> {
        if self.servers.is_empty() {
            return Err(Status::ServFail);
        }
        let id = self.unused_id()?;
        let message =
            compose_query(id, &question, true).map_err(|_| Status::BadName)?;
        let server = if self.rotate {
            let res = self.next_server % self.servers.len();
            self.next_server = res + 1;
            res
        }
        else {
            0
        };
        trace!(
            "query {} {} {} with id {} via server {}",
            question.qname,
            question.qclass,
            question.qtype,
            id,
            server
        );
        self.pending.insert(
            id,
            Pending {
                question,
                message,
                server,
                try_count: 0,
                deadline: Instant::now(),
                completion,
            },
        );
        self.transmit(id);
        self.finish();
        Ok(())
    }

    /// Returns a message ID not used by any outstanding query.
    ///
    /// Starts at a random ID and takes the first free one from there.
    fn unused_id(&self) -> Result<u16, Status> {
        let start: u16 = rand::random();
        (0..=u16::MAX)
            .map(|offset| start.wrapping_add(offset))
            .find(|id| !self.pending.contains_key(id))
            .ok_or_else(|| {
                warn!("no free message ID left");
                Status::NoMem
            })
    }

    /// Sends the query with the given ID to its current server.
    ///
    /// If sending fails, moves on to the next server until sending
    /// succeeds or the query runs out of attempts.
    fn transmit(&mut self, id: u16) {
        loop {
            let query = match self.pending.get_mut(&id) {
                Some(query) => query,
                None => return,
            };
            let server = &self.servers[query.server];
            match self.sockets.send(query.server, server, &query.message) {
                Ok(()) => {
                    query.deadline =
                        Instant::now() + attempt_timeout(
                            self.timeout,
                            query.try_count,
                            self.servers.len(),
                        );
                    return;
                }
                Err(err) => {
                    warn!(
                        "sending query {} to {} failed: {}",
                        id, server.addr, err
                    );
                    if !self.advance(id, Status::ConnRefused) {
                        return;
                    }
                }
            }
        }
    }

    /// Moves a query to its next attempt.
    ///
    /// Returns `false` if the query has run out of attempts and was
    /// finished with the given status.
    fn advance(&mut self, id: u16, status: Status) -> bool {
        let limit = self.tries.saturating_mul(self.servers.len());
        let query = match self.pending.get_mut(&id) {
            Some(query) => query,
            None => return false,
        };
        query.try_count += 1;
        if query.try_count >= limit {
            if let Some(query) = self.pending.remove(&id) {
                debug!("query {} failed: {}", id, status);
                self.done.push(Done::failed(query.completion, status));
            }
            return false;
        }
        query.server = (query.server + 1) % self.servers.len();
        true
    }

    /// Reads everything available on the socket for the given server.
    fn read_socket(&mut self, server: usize) {
        loop {
            let res = match self.sockets.get(server) {
                Some(sock) => sock.recv(&mut self.recv_buf),
                None => return,
            };
            match res {
                Ok(len) => {
                    let answer = self.recv_buf[..len].to_vec();
                    self.handle_answer(server, &answer);
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return
                }
                Err(ref err)
                    if err.kind() == io::ErrorKind::ConnectionRefused =>
                {
                    debug!("server {} refused connection", server);
                    self.fail_server(server, Status::ConnRefused);
                    return;
                }
                Err(err) => {
                    warn!("receiving from server {} failed: {}", server, err);
                    self.fail_server(server, Status::ConnRefused);
                    return;
                }
            }
        }
    }

    /// Moves all queries waiting for a server to their next attempt.
    fn fail_server(&mut self, server: usize, status: Status) {
        self.sockets.close(server);
        let ids: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, query)| query.server == server)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if self.advance(id, status) {
                self.transmit(id);
            }
        }
    }

    /// Processes a message received from a server.
    fn handle_answer(&mut self, server: usize, answer: &[u8]) {
        let msg = match Message::from_slice(answer) {
            Ok(msg) => msg,
            Err(_) => {
                trace!("dropping short message from server {}", server);
                return;
            }
        };
        let id = msg.header().id();
        let query = match self.pending.get(&id) {
            Some(query) => query,
            None => {
                trace!("dropping message with unknown id {}", id);
                return;
            }
        };
        if !self.no_check_response {
            if query.server != server || !msg.is_answer_to(id, &query.question)
            {
                trace!("dropping message not answering query {}", id);
                return;
            }
            let rcode = msg.header().rcode();
            if matches!(rcode, Rcode::SERVFAIL | Rcode::NOTIMP | Rcode::REFUSED)
            {
                debug!("server {} answered query {} with {}", server, id, rcode);
                if self.advance(id, rcode_status(rcode, 0)) {
                    self.transmit(id);
                }
                return;
            }
        }
        if let Some(query) = self.pending.remove(&id) {
            let status = rcode_status(msg.header().rcode(), msg.counts().ancount);
            trace!("query {} answered: {}", id, status);
            self.done.push(Done {
                completion: query.completion,
                status,
                answer: answer.into(),
            });
        }
    }

    /// Retries all queries whose attempt has timed out.
    fn handle_timeouts(&mut self) {
        let now = Instant::now();
        let ids: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, query)| query.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            trace!("query {} timed out", id);
            if self.advance(id, Status::Timeout) {
                self.transmit(id);
            }
        }
    }

    /// Closes idle sockets and reports finished queries.
    fn finish(&mut self) {
        let pending = &self.pending;
        self.sockets
            .close_unused(|server| pending.values().any(|q| q.server == server));
        for done in std::mem::take(&mut self.done) {
            done.report();
        }
    }
}

impl Engine for StubEngine {
    fn query(
        &mut self,
        name: &str,
        class: Class,
        rtype: Rtype,
        callback: AnswerCallback,
    ) -> Result<(), Status> {
        self.start(
            Question::new(name, rtype, class),
            Completion::Answer(callback),
        )
    }

    fn host_by_addr(
        &mut self,
        addr: IpAddr,
        callback: HostCallback,
    ) -> Result<(), Status> {
        self.start(
            Question::new(reverse_name(addr), Rtype::PTR, Class::IN),
            Completion::Host { addr, callback },
        )
    }

    fn process(&mut self, read_fd: Option<RawFd>, _write_fd: Option<RawFd>) {
        if let Some(server) = read_fd.and_then(|fd| self.sockets.server(fd)) {
            self.read_socket(server);
        }
        self.handle_timeouts();
        self.finish();
    }

    fn cancel(&mut self) {
        for (_, query) in self.pending.drain() {
            self.done.push(Done::failed(query.completion, Status::Cancelled));
        }
        self.finish();
    }

    fn servers(&self) -> Vec<ServerAddr> {
        self.servers.clone()
    }

    fn set_servers(&mut self, servers: &[ServerAddr]) -> Result<(), Status> {
        if !self.pending.is_empty() {
            return Err(Status::NotImp);
        }
        self.sockets.close_unused(|_| false);
        self.servers = servers.into();
        self.next_server = 0;
        Ok(())
    }

    fn set_local_ipv4(&mut self, addr: Ipv4Addr) {
        self.sockets.local_ipv4 = addr;
    }

    fn set_local_ipv6(&mut self, addr: Ipv6Addr) {
        self.sockets.local_ipv6 = addr;
    }
}

impl Drop for StubEngine {
    fn drop(&mut self) {
        // The channel is gone already, so sockets close silently.
        self.sockets.map.clear();
        for (_, query) in self.pending.drain() {
            Done::failed(query.completion, Status::Destruction).report();
        }
    }
}

//------------ Sockets -------------------------------------------------------

/// The sockets of an engine, one per server.
struct Sockets {
    map: HashMap<usize, UdpSocket>,
    local_ipv4: Ipv4Addr,
    local_ipv6: Ipv6Addr,
    sock_state: SockStateCallback,
}

impl Sockets {
    fn new(sock_state: SockStateCallback) -> Self {
        Sockets {
            map: HashMap::new(),
            local_ipv4: Ipv4Addr::UNSPECIFIED,
            local_ipv6: Ipv6Addr::UNSPECIFIED,
            sock_state,
        }
    }

    fn get(&self, server: usize) -> Option<&UdpSocket> {
        self.map.get(&server)
    }

    /// Returns the server whose socket has the given descriptor.
    fn server(&self, fd: RawFd) -> Option<usize> {
        self.map
            .iter()
            .find(|(_, sock)| sock.as_raw_fd() == fd)
            .map(|(server, _)| *server)
    }

    /// Sends a message to a server, opening its socket if necessary.
    fn send(
        &mut self,
        server: usize,
        addr: &ServerAddr,
        message: &[u8],
    ) -> Result<(), io::Error> {
        if !self.map.contains_key(&server) {
            let sock = self.open(addr)?;
            let fd = sock.as_raw_fd();
            self.map.insert(server, sock);
            trace!("opened socket {} for server {}", fd, addr.addr);
            (self.sock_state)(fd, true, false);
        }
        let sent = match self.map.get(&server) {
            Some(sock) => sock.send(message),
            None => return Err(io::ErrorKind::NotConnected.into()),
        };
        match sent {
            Ok(len) if len == message.len() => Ok(()),
            Ok(_) => {
                self.close(server);
                Err(io::Error::new(io::ErrorKind::Other, "short send"))
            }
            Err(err) => {
                self.close(server);
                Err(err)
            }
        }
    }

    fn open(&self, addr: &ServerAddr) -> Result<UdpSocket, io::Error> {
        let local = match addr.addr {
            IpAddr::V4(_) => IpAddr::V4(self.local_ipv4),
            IpAddr::V6(_) => IpAddr::V6(self.local_ipv6),
        };
        let port = match addr.udp_port {
            0 => DEFAULT_PORT,
            port => port,
        };
        let sock = UdpSocket::bind(SocketAddr::new(local, 0))?;
        sock.connect(SocketAddr::new(addr.addr, port))?;
        sock.set_nonblocking(true)?;
        Ok(sock)
    }

    /// Closes the socket for a server.
    fn close(&mut self, server: usize) {
        if let Some(sock) = self.map.remove(&server) {
            let fd = sock.as_raw_fd();
            trace!("closing socket {}", fd);
            (self.sock_state)(fd, false, false);
        }
    }

    /// Closes all sockets for servers not in use.
    fn close_unused(&mut self, in_use: impl Fn(usize) -> bool) {
        let unused: Vec<_> = self
            .map
            .keys()
            .copied()
            .filter(|server| !in_use(*server))
            .collect();
        for server in unused {
            self.close(server);
        }
    }
}

//------------ Pending -------------------------------------------------------

/// An outstanding query.
struct Pending {
    question: Question,
    message: Vec<u8>,

    /// The index of the server the current attempt went to.
    server: usize,

    /// The number of attempts that have been abandoned.
    try_count: usize,

    deadline: Instant,
    completion: Completion,
}

//------------ Completion and Done -------------------------------------------

enum Completion {
    Answer(AnswerCallback),
    Host { addr: IpAddr, callback: HostCallback },
}

struct Done {
    completion: Completion,
    status: Status,
    answer: Box<[u8]>,
}

impl Done {
    fn failed(completion: Completion, status: Status) -> Self {
        Done {
            completion,
            status,
            answer: Box::default(),
        }
    }

    fn report(self) {
        match self.completion {
            Completion::Answer(callback) => {
                if self.status.is_success() {
                    callback(self.status, &self.answer)
                }
                else {
                    callback(self.status, &[])
                }
            }
            Completion::Host { addr, callback } => {
                if !self.status.is_success() {
                    return callback(self.status, None);
                }
                match parse_ptr_reply(&self.answer, Some(addr)) {
                    Ok(host) => callback(Status::Success, Some(&host)),
                    Err(status) => callback(status, None::<&HostEnt>),
                }
            }
        }
    }
}

//------------ Helpers -------------------------------------------------------

/// Returns the status for a response.
fn rcode_status(rcode: Rcode, ancount: u16) -> Status {
    match rcode {
        Rcode::NOERROR if ancount > 0 => Status::Success,
        Rcode::NOERROR => Status::NoData,
        Rcode::FORMERR => Status::FormErr,
        Rcode::SERVFAIL => Status::ServFail,
        Rcode::NXDOMAIN => Status::NotFound,
        Rcode::NOTIMP => Status::NotImp,
        Rcode::REFUSED => Status::Refused,
        _ => Status::BadResp,
    }
}

/// Returns the timeout for an attempt.
///
/// The timeout doubles with each full round over all servers.
fn attempt_timeout(base: Duration, try_count: usize, servers: usize) -> Duration {
    let rounds = try_count / servers.max(1);
    let shift = u32::try_from(rounds)
        .unwrap_or(MAX_BACKOFF_SHIFT)
        .min(MAX_BACKOFF_SHIFT);
    base * (1u32 << shift)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::testing::ResponseBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread::sleep;

    type Events = Rc<RefCell<Vec<(RawFd, bool, bool)>>>;
    type Results = Rc<RefCell<Vec<(Status, Vec<u8>)>>>;

    fn init_logging() {
        // Override with env var RUST_LOG, e.g. RUST_LOG=trace.
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    }

    fn engine(
        servers: Vec<ServerAddr>,
        timeout_ms: u32,
        tries: u32,
    ) -> (StubEngine, Events) {
        init_logging();
        let events = Events::default();
        let sink = events.clone();
        let mut conf = ResolvConf::new();
        conf.servers = servers;
        let engine = StubEngine::new(
            conf,
            EngineOptions {
                no_check_response: false,
                timeout_ms: Some(timeout_ms),
                tries: Some(tries),
                sock_state: Rc::new(move |fd, read, write| {
                    sink.borrow_mut().push((fd, read, write))
                }),
            },
        );
        (engine, events)
    }

    fn collect(results: &Results) -> AnswerCallback {
        let results = results.clone();
        Box::new(move |status, answer| {
            results.borrow_mut().push((status, answer.into()))
        })
    }

    fn server_socket() -> (UdpSocket, ServerAddr) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = sock.local_addr().unwrap();
        (sock, ServerAddr::new(addr.ip(), addr.port()))
    }

    /// Processes the engine until the condition holds.
    fn process_until(
        engine: &mut StubEngine,
        fd: Option<RawFd>,
        cond: impl Fn() -> bool,
    ) {
        for _ in 0..200 {
            engine.process(fd, None);
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10));
        }
        panic!("engine did not finish");
    }

    #[test]
    fn answer_received() {
        let (server, addr) = server_socket();
        let (mut engine, events) = engine(vec![addr], 5000, 1);
        let results = Results::default();
        engine
            .query("example.com", Class::IN, Rtype::A, collect(&results))
            .unwrap();
        let fd = events.borrow()[0].0;
        assert_eq!(events.borrow().as_slice(), &[(fd, true, false)]);

        let mut buf = [0u8; 512];
        let (len, peer) = server.recv_from(&mut buf).unwrap();
        let msg = Message::from_slice(&buf[..len]).unwrap();
        assert!(msg.header().rd());
        assert_eq!(
            msg.first_question().unwrap(),
            Question::new("example.com", Rtype::A, Class::IN)
        );

        // Something unrelated first, then the answer.
        let stray = ResponseBuilder::new("example.org", Rtype::A)
            .id(msg.header().id())
            .a("example.org", "192.0.2.9", 60)
            .finish();
        server.send_to(&stray, peer).unwrap();
        let answer = ResponseBuilder::new("example.com", Rtype::A)
            .id(msg.header().id())
            .a("example.com", "192.0.2.1", 60)
            .finish();
        server.send_to(&answer, peer).unwrap();

        process_until(&mut engine, Some(fd), || !results.borrow().is_empty());
        assert_eq!(results.borrow().as_slice(), &[(Status::Success, answer)]);
        assert_eq!(events.borrow().last(), Some(&(fd, false, false)));
    }

    #[test]
    fn rcode_mapped() {
        let (server, addr) = server_socket();
        let (mut engine, events) = engine(vec![addr], 5000, 1);
        let results = Results::default();
        engine
            .query("nx.example.com", Class::IN, Rtype::MX, collect(&results))
            .unwrap();
        let fd = events.borrow()[0].0;

        let mut buf = [0u8; 512];
        let (len, peer) = server.recv_from(&mut buf).unwrap();
        let id = Message::from_slice(&buf[..len]).unwrap().header().id();
        let answer = ResponseBuilder::new("nx.example.com", Rtype::MX)
            .id(id)
            .rcode(Rcode::NXDOMAIN)
            .finish();
        server.send_to(&answer, peer).unwrap();

        process_until(&mut engine, Some(fd), || !results.borrow().is_empty());
        assert_eq!(
            results.borrow().as_slice(),
            &[(Status::NotFound, Vec::new())]
        );
    }

    #[test]
    fn timeout() {
        let (_server, addr) = server_socket();
        let (mut engine, events) = engine(vec![addr], 20, 2);
        let results = Results::default();
        engine
            .query("example.com", Class::IN, Rtype::A, collect(&results))
            .unwrap();
        let fd = events.borrow()[0].0;
        process_until(&mut engine, None, || !results.borrow().is_empty());
        assert_eq!(
            results.borrow().as_slice(),
            &[(Status::Timeout, Vec::new())]
        );
        assert_eq!(events.borrow().last(), Some(&(fd, false, false)));
    }

    #[test]
    fn connection_refused() {
        let (server, addr) = server_socket();
        drop(server);
        let (mut engine, events) = engine(vec![addr], 5000, 1);
        let results = Results::default();
        engine
            .query("example.com", Class::IN, Rtype::A, collect(&results))
            .unwrap();
        let fd = events.borrow()[0].0;
        process_until(&mut engine, Some(fd), || !results.borrow().is_empty());
        assert_eq!(
            results.borrow().as_slice(),
            &[(Status::ConnRefused, Vec::new())]
        );
    }

    #[test]
    fn bad_name() {
        let (_server, addr) = server_socket();
        let (mut engine, events) = engine(vec![addr], 5000, 1);
        let results = Results::default();
        let name = "a".repeat(64);
        assert_eq!(
            engine.query(&name, Class::IN, Rtype::A, collect(&results)),
            Err(Status::BadName)
        );
        assert!(events.borrow().is_empty());
        assert!(results.borrow().is_empty());
    }

    #[test]
    fn cancel_and_drop() {
        let (_server, addr) = server_socket();
        let (mut engine, events) = engine(vec![addr], 5000, 1);
        let results = Results::default();
        engine
            .query("one.example", Class::IN, Rtype::A, collect(&results))
            .unwrap();
        assert_eq!(engine.set_servers(&[addr]), Err(Status::NotImp));
        engine.cancel();
        assert_eq!(
            results.borrow().as_slice(),
            &[(Status::Cancelled, Vec::new())]
        );
        assert_eq!(events.borrow().len(), 2);

        engine
            .query("two.example", Class::IN, Rtype::A, collect(&results))
            .unwrap();
        assert_eq!(events.borrow().len(), 3);
        drop(engine);
        assert_eq!(results.borrow()[1], (Status::Destruction, Vec::new()));
        assert_eq!(events.borrow().len(), 3);
    }

    #[test]
    fn set_servers_when_idle() {
        let (mut engine, _) = engine(vec![ServerAddr::fallback()], 5000, 1);
        let servers = [ServerAddr::new("192.0.2.53".parse().unwrap(), 5353)];
        engine.set_servers(&servers).unwrap();
        assert_eq!(engine.servers(), servers);
    }

    #[test]
    fn backoff() {
        let base = Duration::from_millis(100);
        assert_eq!(attempt_timeout(base, 0, 2), base);
        assert_eq!(attempt_timeout(base, 1, 2), base);
        assert_eq!(attempt_timeout(base, 2, 2), base * 2);
        assert_eq!(attempt_timeout(base, 4, 2), base * 4);
        assert_eq!(attempt_timeout(base, 1000, 1), base * 64);
    }

    #[test]
    fn message_ids_run_out() {
        let (mut engine, _) = engine(vec![ServerAddr::fallback()], 1000, 1);
        let question = Question::new("example.com", Rtype::A, Class::IN);
        for id in 0..u16::MAX {
            engine.pending.insert(
                id,
                Pending {
                    question: question.clone(),
                    message: Vec::new(),
                    server: 0,
                    try_count: 0,
                    deadline: Instant::now(),
                    completion: Completion::Answer(Box::new(|_, _| {})),
                },
            );
        }
        assert_eq!(engine.unused_id(), Ok(u16::MAX));

        engine.pending.insert(
            u16::MAX,
            Pending {
                question,
                message: Vec::new(),
                server: 0,
                try_count: 0,
                deadline: Instant::now(),
                completion: Completion::Answer(Box::new(|_, _| {})),
            },
        );
        assert_eq!(engine.unused_id(), Err(Status::NoMem));
        let res = engine.query(
            "example.com",
            Class::IN,
            Rtype::A,
            Box::new(|_, _| panic!("callback of a rejected query")),
        );
        assert_eq!(res, Err(Status::NoMem));
        engine.pending.clear();
    }
}
