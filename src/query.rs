//! Dispatching queries and delivering their results.
//!
//! Every query started through a [`Channel`](crate::Channel) becomes a
//! [`Query`] shared between the caller’s [`ResolveFuture`] and, for as
//! long as it is outstanding, the engine. The engine doesn’t own the query
//! itself, only a [`CallbackToken`] that refers to it weakly. If the
//! caller drops the future, the query goes away and the token is cleared,
//! so a late completion finds nothing to deliver to.
//!
//! A completion never delivers the result right away. It copies the
//! answer out of the engine’s buffer into the query and defers waking the
//! caller to the channel’s next-tick queue. The caller thus never runs
//! while the engine is still on the stack. The answer is parsed once the
//! caller polls the future, by the parser of the query’s [`Kind`].

use crate::channel::ChannelInner;
use crate::base::iana::{Class, Rtype};
use crate::engine::{AnswerCallback, Engine, HostCallback, HostEnt};
use crate::error::Error;
use crate::record::{AddrTtl, AnyRecord, Answer, Caa, Mx, Naptr, Soa, Srv, Txt};
use crate::reply::{self, General, GeneralType};
use crate::status::Status;
use bytes::Bytes;
use std::cell::RefCell;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::{fmt, mem};
use tokio::sync::oneshot;
use tracing::trace;

//------------ QueryKind -----------------------------------------------------

/// The kinds of queries a channel can send.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum QueryKind {
    Any,
    A,
    Aaaa,
    Caa,
    Cname,
    Mx,
    Ns,
    Txt,
    Srv,
    Ptr,
    Naptr,
    Soa,
    Reverse,
}

impl QueryKind {
    fn info(self) -> &'static KindInfo {
        &KINDS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

/// How a kind of query is sent to the engine.
enum Dispatch {
    /// A query for the given record type in class IN.
    Query(Rtype),

    /// A reverse lookup of an address.
    HostByAddr,
}

struct KindInfo {
    name: &'static str,
    send: Dispatch,
}

/// The kinds in the order of [`QueryKind`].
static KINDS: [KindInfo; 13] = [
    KindInfo {
        name: "queryAny",
        send: Dispatch::Query(Rtype::ANY),
    },
    KindInfo {
        name: "queryA",
        send: Dispatch::Query(Rtype::A),
    },
    KindInfo {
        name: "queryAaaa",
        send: Dispatch::Query(Rtype::AAAA),
    },
    KindInfo {
        name: "queryCaa",
        send: Dispatch::Query(Rtype::CAA),
    },
    KindInfo {
        name: "queryCname",
        send: Dispatch::Query(Rtype::CNAME),
    },
    KindInfo {
        name: "queryMx",
        send: Dispatch::Query(Rtype::MX),
    },
    KindInfo {
        name: "queryNs",
        send: Dispatch::Query(Rtype::NS),
    },
    KindInfo {
        name: "queryTxt",
        send: Dispatch::Query(Rtype::TXT),
    },
    KindInfo {
        name: "querySrv",
        send: Dispatch::Query(Rtype::SRV),
    },
    KindInfo {
        name: "queryPtr",
        send: Dispatch::Query(Rtype::PTR),
    },
    KindInfo {
        name: "queryNaptr",
        send: Dispatch::Query(Rtype::NAPTR),
    },
    KindInfo {
        name: "querySoa",
        send: Dispatch::Query(Rtype::SOA),
    },
    KindInfo {
        name: "getHostByAddr",
        send: Dispatch::HostByAddr,
    },
];

//------------ Kind ----------------------------------------------------------

/// A kind of query together with the parser for its answers.
pub(crate) struct Kind<T> {
    kind: QueryKind,
    parse: fn(&Response) -> Result<T, Status>,
}

impl<T> Clone for Kind<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Kind<T> {}

/// The kinds of queries offered by a channel.
pub(crate) mod kinds {
    use super::*;

    pub const ANY: Kind<Vec<AnyRecord>> = Kind {
        kind: QueryKind::Any,
        parse: |res| reply::parse_any(res.answer()?),
    };
    pub const A: Kind<Vec<AddrTtl>> = Kind {
        kind: QueryKind::A,
        parse: |res| addrs(res, GeneralType::A),
    };
    pub const AAAA: Kind<Vec<AddrTtl>> = Kind {
        kind: QueryKind::Aaaa,
        parse: |res| addrs(res, GeneralType::Aaaa),
    };
    pub const CAA: Kind<Vec<Caa>> = Kind {
        kind: QueryKind::Caa,
        parse: |res| reply::parse_caa(res.answer()?),
    };
    pub const CNAME: Kind<Vec<String>> = Kind {
        kind: QueryKind::Cname,
        parse: |res| names(res, GeneralType::Cname),
    };
    pub const MX: Kind<Vec<Mx>> = Kind {
        kind: QueryKind::Mx,
        parse: |res| reply::parse_mx(res.answer()?),
    };
    pub const NS: Kind<Vec<String>> = Kind {
        kind: QueryKind::Ns,
        parse: |res| names(res, GeneralType::Ns),
    };
    pub const TXT: Kind<Vec<Txt>> = Kind {
        kind: QueryKind::Txt,
        parse: |res| reply::parse_txt(res.answer()?),
    };
    pub const SRV: Kind<Vec<Srv>> = Kind {
        kind: QueryKind::Srv,
        parse: |res| reply::parse_srv(res.answer()?),
    };
    pub const PTR: Kind<Vec<String>> = Kind {
        kind: QueryKind::Ptr,
        parse: |res| names(res, GeneralType::Ptr),
    };
    pub const NAPTR: Kind<Vec<Naptr>> = Kind {
        kind: QueryKind::Naptr,
        parse: |res| reply::parse_naptr(res.answer()?),
    };
    pub const SOA: Kind<Soa> = Kind {
        kind: QueryKind::Soa,
        parse: |res| reply::parse_soa(res.answer()?),
    };
    pub const REVERSE: Kind<Vec<String>> = Kind {
        kind: QueryKind::Reverse,
        parse: parse_reverse,
    };
}

fn parse_reverse(response: &Response) -> Result<Vec<String>, Status> {
    match response.data {
        ResponseData::Host(Some(ref host)) => Ok(host.aliases.clone()),
        _ => Err(Status::BadResp),
    }
}

fn addrs(
    response: &Response,
    gtype: GeneralType,
) -> Result<Vec<AddrTtl>, Status> {
    match reply::parse_general(response.answer()?, gtype)? {
        General::Addrs(addrs) => Ok(addrs),
        General::Cname(_) | General::Names(_) => Err(Status::BadResp),
    }
}

fn names(
    response: &Response,
    gtype: GeneralType,
) -> Result<Vec<String>, Status> {
    match reply::parse_general(response.answer()?, gtype)? {
        General::Cname(name) => Ok(vec![name]),
        General::Names(names) => Ok(names),
        General::Addrs(_) => Err(Status::BadResp),
    }
}

/// Turns a response into the caller’s result.
fn outcome<T>(
    response: &Response,
    parse: fn(&Response) -> Result<T, Status>,
) -> Result<Answer<T>, Error> {
    match response.status {
        Status::Success => match parse(response) {
            Ok(value) => Ok(Answer::Found(value)),
            Err(Status::NoData) => Ok(Answer::NoData),
            Err(status) => Err(Error::Resolve(status)),
        },
        Status::NoData => Ok(Answer::NoData),
        status => Err(Error::Resolve(status)),
    }
}

//------------ Response ------------------------------------------------------

/// The outcome of a query copied out of the engine.
pub(crate) struct Response {
    status: Status,
    data: ResponseData,
}

enum ResponseData {
    Answer(Bytes),
    Host(Option<HostEnt>),
}

impl Response {
    fn answer(&self) -> Result<&[u8], Status> {
        match self.data {
            ResponseData::Answer(ref bytes) => Ok(bytes.as_ref()),
            ResponseData::Host(_) => Err(Status::BadResp),
        }
    }
}

//------------ CallbackToken -------------------------------------------------

/// The engine’s handle to a query.
///
/// The token refers to the query until either the query is dropped or a
/// completion claims it, whichever comes first.
#[derive(Clone)]
pub(crate) struct CallbackToken(Rc<RefCell<Option<Weak<Query>>>>);

impl CallbackToken {
    fn new(query: Weak<Query>) -> Self {
        CallbackToken(Rc::new(RefCell::new(Some(query))))
    }

    /// Takes the query if it is still around.
    fn claim(&self) -> Option<Rc<Query>> {
        self.0.borrow_mut().take().and_then(|query| query.upgrade())
    }

    fn clear(&self) {
        self.0.borrow_mut().take();
    }
}

//------------ Query ---------------------------------------------------------

/// An outstanding query.
pub(crate) struct Query {
    /// The channel the query was sent through.
    ///
    /// Keeps the channel alive until the query is done.
    channel: Rc<ChannelInner>,

    kind: QueryKind,
    name: String,
    token: CallbackToken,
    response: RefCell<Option<Response>>,
    sender: RefCell<Option<oneshot::Sender<Response>>>,
}

impl Query {
    /// Starts a query.
    ///
    /// The channel’s count of active queries goes up right away and comes
    /// down again either here if the engine rejects the query or once the
    /// engine completes it.
    pub fn dispatch<T>(
        channel: &Rc<ChannelInner>,
        kind: Kind<T>,
        name: &str,
    ) -> ResolveFuture<T> {
        let Kind { kind, parse } = kind;
        let (tx, rx) = oneshot::channel();
        let query = Rc::new_cyclic(|weak| Query {
            channel: channel.clone(),
            kind,
            name: name.into(),
            token: CallbackToken::new(weak.clone()),
            response: RefCell::new(None),
            sender: RefCell::new(Some(tx)),
        });
        trace!("{}: dispatching {}", kind.name(), name);
        channel.increment();
        if let Err(err) = query.send() {
            channel.decrement();
            trace!("{}: dispatching {} failed: {}", kind.name(), name, err);
            return ResolveFuture::failed(err, parse);
        }
        ResolveFuture {
            state: State::Waiting { query, rx },
            parse,
        }
    }

    fn send(self: &Rc<Self>) -> Result<(), Error> {
        match self.kind.info().send {
            Dispatch::Query(rtype) => {
                self.channel.ensure_servers();
                let callback = self.answer_callback();
                self.channel.with_engine(|engine: &mut dyn Engine| {
                    engine.query(&self.name, Class::IN, rtype, callback)
                })?;
            }
            Dispatch::HostByAddr => {
                let addr = self
                    .name
                    .parse::<IpAddr>()
                    .map_err(|_| Error::InvalidArgument("invalid IP address"))?;
                let callback = self.host_callback();
                self.channel.with_engine(|engine: &mut dyn Engine| {
                    engine.host_by_addr(addr, callback)
                })?;
            }
        }
        Ok(())
    }

    fn answer_callback(&self) -> AnswerCallback {
        let token = self.token.clone();
        let channel = Rc::downgrade(&self.channel);
        Box::new(move |status, answer| {
            complete(&channel, &token, status, || {
                ResponseData::Answer(Bytes::copy_from_slice(answer))
            })
        })
    }

    fn host_callback(&self) -> HostCallback {
        let token = self.token.clone();
        let channel = Rc::downgrade(&self.channel);
        Box::new(move |status, host| {
            complete(&channel, &token, status, || {
                ResponseData::Host(host.cloned())
            })
        })
    }

    /// Hands the buffered response to the caller.
    fn deliver(&self) {
        let response = match self.response.borrow_mut().take() {
            Some(response) => response,
            None => return,
        };
        if let Some(sender) = self.sender.borrow_mut().take() {
            // The caller may have lost interest in the meantime.
            let _ = sender.send(response);
        }
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.token.clear();
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Processes the completion of a query.
fn complete(
    channel: &Weak<ChannelInner>,
    token: &CallbackToken,
    status: Status,
    data: impl FnOnce() -> ResponseData,
) {
    if let Some(channel) = channel.upgrade() {
        channel.settle(status);
    }
    let query = match token.claim() {
        Some(query) => query,
        None => {
            trace!("dropping completion ({}) of abandoned query", status);
            return;
        }
    };
    *query.response.borrow_mut() = Some(Response {
        status,
        data: data(),
    });
    let channel = query.channel.clone();
    channel.defer(Box::new(move || query.deliver()));
}

//------------ ResolveFuture -------------------------------------------------

/// The result of a query sent through a channel.
///
/// The query is sent when the future is created, not when it is first
/// polled. Dropping the future abandons the query. The engine still
/// finishes it but the result is discarded.
#[must_use = "dropping the future abandons the query"]
pub struct ResolveFuture<T> {
    state: State,
    parse: fn(&Response) -> Result<T, Status>,
}

enum State {
    Failed(Error),
    Waiting {
        query: Rc<Query>,
        rx: oneshot::Receiver<Response>,
    },
    Done,
}

impl<T> ResolveFuture<T> {
    fn failed(err: Error, parse: fn(&Response) -> Result<T, Status>) -> Self {
        ResolveFuture {
            state: State::Failed(err),
            parse,
        }
    }
}

impl<T> Future for ResolveFuture<T> {
    type Output = Result<Answer<T>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        match mem::replace(&mut this.state, State::Done) {
            State::Failed(err) => Poll::Ready(Err(err)),
            State::Waiting { query, mut rx } => {
                match Pin::new(&mut rx).poll(cx) {
                    Poll::Pending => {
                        this.state = State::Waiting { query, rx };
                        Poll::Pending
                    }
                    Poll::Ready(Ok(response)) => {
                        Poll::Ready(outcome(&response, this.parse))
                    }
                    Poll::Ready(Err(_)) => {
                        Poll::Ready(Err(Error::Resolve(Status::Destruction)))
                    }
                }
            }
            State::Done => panic!("ResolveFuture polled after completion"),
        }
    }
}

impl<T> fmt::Debug for ResolveFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match self.state {
            State::Failed(ref err) => format!("failed: {}", err),
            State::Waiting { ref query, .. } => format!("{:?}", query),
            State::Done => "done".into(),
        };
        f.debug_tuple("ResolveFuture").field(&state).finish()
    }
}

//============ Testing =======================================================
