//! A scripted engine for testing channels.
//!
//! A [`Mock`] is a handle shared between a test and every engine created
//! through its factory. The test opens and closes sockets on behalf of
//! the current engine, makes them readable, and completes queries, either
//! directly or by scripting answers that are handed out whenever the
//! engine processes a readable socket.

use super::{
    AnswerCallback, Engine, EngineFactory, EngineOptions, HostCallback,
    HostEnt, ServerAddr, SockStateCallback,
};
use crate::base::iana::{Class, Rtype};
use crate::status::Status;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

//------------ Mock ----------------------------------------------------------

#[derive(Clone, Default)]
pub struct Mock {
    state: Rc<RefCell<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// The server list new engines start with.
    initial_servers: Vec<ServerAddr>,

    servers: Vec<ServerAddr>,
    generation: usize,
    options: Option<EngineOptions>,
    queries: Vec<MockQuery>,
    script: VecDeque<(Status, Vec<u8>)>,
    sockets: HashMap<RawFd, (UnixStream, UnixStream)>,
    processed: Vec<(Option<RawFd>, Option<RawFd>)>,
    fail_next: Option<Status>,
    local_ipv4: Option<Ipv4Addr>,
    local_ipv6: Option<Ipv6Addr>,
}

struct MockQuery {
    generation: usize,
    name: String,
    rtype: Rtype,
    completion: Completion,
}

enum Completion {
    Answer(AnswerCallback),
    Host(IpAddr, HostCallback),
}

impl Completion {
    fn complete(self, status: Status, answer: &[u8]) {
        match self {
            Completion::Answer(callback) => callback(status, answer),
            Completion::Host(addr, callback) => {
                if status.is_success() {
                    let name = String::from_utf8_lossy(answer).into_owned();
                    let host = HostEnt {
                        name: name.clone(),
                        aliases: vec![name],
                        addrs: vec![addr],
                    };
                    callback(status, Some(&host))
                }
                else {
                    callback(status, None)
                }
            }
        }
    }
}

impl Mock {
    /// Creates a mock whose engines start with the given servers.
    pub fn with_servers(servers: Vec<ServerAddr>) -> Self {
        let res = Mock::default();
        res.state.borrow_mut().initial_servers = servers;
        res
    }

    pub fn factory(&self) -> Rc<dyn EngineFactory> {
        Rc::new(self.clone())
    }

    /// Returns the number of engines created so far.
    pub fn generation(&self) -> usize {
        self.state.borrow().generation
    }

    pub fn options(&self) -> (Option<u32>, Option<u32>, bool) {
        let state = self.state.borrow();
        match state.options {
            Some(ref options) => (
                options.timeout_ms,
                options.tries,
                options.no_check_response,
            ),
            None => (None, None, false),
        }
    }

    /// Sets the server list of the current engine behind its back.
    pub fn set_engine_servers(&self, servers: Vec<ServerAddr>) {
        self.state.borrow_mut().servers = servers;
    }

    /// Makes the next query fail synchronously.
    pub fn fail_next(&self, status: Status) {
        self.state.borrow_mut().fail_next = Some(status);
    }

    /// Returns the outstanding queries as name and type.
    pub fn pending(&self) -> Vec<(String, Rtype)> {
        self.state
            .borrow()
            .queries
            .iter()
            .map(|query| (query.name.clone(), query.rtype))
            .collect()
    }

    pub fn processed(&self) -> Vec<(Option<RawFd>, Option<RawFd>)> {
        self.state.borrow().processed.clone()
    }

    pub fn local_addrs(&self) -> (Option<Ipv4Addr>, Option<Ipv6Addr>) {
        let state = self.state.borrow();
        (state.local_ipv4, state.local_ipv6)
    }

    /// Completes the oldest outstanding query.
    pub fn complete(&self, status: Status, answer: &[u8]) {
        let query = {
            let mut state = self.state.borrow_mut();
            assert!(!state.queries.is_empty(), "no outstanding query");
            state.queries.remove(0)
        };
        query.completion.complete(status, answer);
    }

    /// Queues an answer for the next time a socket is processed.
    pub fn script(&self, status: Status, answer: &[u8]) {
        self.state
            .borrow_mut()
            .script
            .push_back((status, answer.into()));
    }

    /// Opens a socket for the current engine, asking for readability.
    pub fn open_socket(&self) -> RawFd {
        let (ours, peer) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        let fd = ours.as_raw_fd();
        self.state.borrow_mut().sockets.insert(fd, (ours, peer));
        self.sock_state(fd, true, false);
        fd
    }

    /// Changes the interest for a socket.
    pub fn sock_state(&self, fd: RawFd, read: bool, write: bool) {
        let callback = self.callback();
        callback(fd, read, write);
    }

    /// Closes a socket of the current engine.
    pub fn close_socket(&self, fd: RawFd) {
        self.sock_state(fd, false, false);
        self.state.borrow_mut().sockets.remove(&fd);
    }

    /// Makes a socket readable.
    pub fn make_readable(&self, fd: RawFd) {
        let mut state = self.state.borrow_mut();
        let (_, peer) = state.sockets.get_mut(&fd).unwrap();
        peer.write_all(b"x").unwrap();
    }

    fn callback(&self) -> SockStateCallback {
        let state = self.state.borrow();
        let options = state.options.as_ref().unwrap();
        options.sock_state.clone()
    }
}

impl EngineFactory for Mock {
    fn create(
        &self,
        options: EngineOptions,
    ) -> Result<Box<dyn Engine>, Status> {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        state.servers = state.initial_servers.clone();
        state.options = Some(options);
        Ok(Box::new(MockEngine {
            mock: self.clone(),
            generation: state.generation,
        }))
    }
}

//------------ MockEngine ----------------------------------------------------

pub struct MockEngine {
    mock: Mock,
    generation: usize,
}

impl MockEngine {
    fn start(
        &mut self,
        name: String,
        rtype: Rtype,
        completion: Completion,
    ) -> Result<(), Status> {
        let mut state = self.mock.state.borrow_mut();
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        state.queries.push(MockQuery {
            generation: self.generation,
            name,
            rtype,
            completion,
        });
        Ok(())
    }

    /// Removes all outstanding queries of this engine.
    fn take_queries(&self) -> Vec<MockQuery> {
        let mut state = self.mock.state.borrow_mut();
        let (own, other): (Vec<_>, Vec<_>) = std::mem::take(&mut state.queries)
            .into_iter()
            .partition(|query| query.generation == self.generation);
        state.queries = other;
        own
    }
}

impl Engine for MockEngine {
    fn query(
        &mut self,
        name: &str,
        _class: Class,
        rtype: Rtype,
        callback: AnswerCallback,
    ) -> Result<(), Status> {
        self.start(name.into(), rtype, Completion::Answer(callback))
    }

    fn host_by_addr(
        &mut self,
        addr: IpAddr,
        callback: HostCallback,
    ) -> Result<(), Status> {
        self.start(addr.to_string(), Rtype::PTR, Completion::Host(addr, callback))
    }

    fn process(&mut self, read_fd: Option<RawFd>, write_fd: Option<RawFd>) {
        let next = {
            let mut state = self.mock.state.borrow_mut();
            state.processed.push((read_fd, write_fd));
            let read = match read_fd {
                Some(fd) => state.sockets.get_mut(&fd),
                None => None,
            };
            match read {
                Some((ours, _)) => {
                    let mut buf = [0u8; 64];
                    while matches!(ours.read(&mut buf), Ok(len) if len > 0) {}
                    if state.queries.is_empty() {
                        None
                    }
                    else {
                        state.script.pop_front()
                    }
                }
                None => None,
            }
        };
        if let Some((status, answer)) = next {
            self.mock.complete(status, &answer);
        }
    }

    fn cancel(&mut self) {
        for query in self.take_queries() {
            query.completion.complete(Status::Cancelled, &[]);
        }
    }

    fn servers(&self) -> Vec<ServerAddr> {
        self.mock.state.borrow().servers.clone()
    }

    fn set_servers(&mut self, servers: &[ServerAddr]) -> Result<(), Status> {
        self.mock.state.borrow_mut().servers = servers.into();
        Ok(())
    }

    fn set_local_ipv4(&mut self, addr: Ipv4Addr) {
        self.mock.state.borrow_mut().local_ipv4 = Some(addr);
    }

    fn set_local_ipv6(&mut self, addr: Ipv6Addr) {
        self.mock.state.borrow_mut().local_ipv6 = Some(addr);
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.mock.state.borrow_mut().sockets.clear();
        for query in self.take_queries() {
            query.completion.complete(Status::Destruction, &[]);
        }
    }
}
