//! An asynchronous DNS resolution channel.
//!
//! This crate issues DNS queries from a single-threaded event loop and
//! decodes the answers into typed records. It is built from a few layers:
//!
//! * [engine] contains the resolver engines that do the actual DNS work:
//!   building and sending queries over their own sockets and matching the
//!   responses. The crate ships with a UDP stub engine configured from the
//!   system’s `resolv.conf`.
//! * [channel] connects an engine to the [Tokio](https://tokio.rs/) event
//!   loop. It registers the engine’s sockets, reports their readiness back
//!   to the engine, and drives the engine’s timeouts.
//! * [reply] parses the raw answers into the values defined in [record].
//! * [lookup] wraps the operating system’s own resolver for looking up
//!   addresses and host names without a channel.
//! * [base] provides the DNS wire format pieces all of the above build
//!   upon.
//!
//! The most convenient way to get started is a [`Channel`]:
//!
//! ```no_run
//! use resolv_channel::{Channel, ChannelOptions};
//! use tokio::task::LocalSet;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     LocalSet::new().run_until(async {
//!         let channel = Channel::new(ChannelOptions::default()).unwrap();
//!         match channel.query_mx("example.com").await {
//!             Ok(answer) => println!("{:?}", answer),
//!             Err(err) => eprintln!("{}", err),
//!         }
//!     }).await
//! }
//! ```
//!
//! # Reference of Feature Flags
//!
//! * `serde`: implements `Serialize` for the record values.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use self::channel::{Channel, ChannelOptions, Server};
pub use self::error::Error;
pub use self::query::ResolveFuture;
pub use self::record::{
    AddrTtl, Answer, AnyRecord, Caa, Mx, Naptr, Soa, Srv, Txt,
};
pub use self::status::{strerror, Status};

pub mod base;
pub mod channel;
pub mod engine;
pub mod error;
pub mod library;
pub mod lookup;
mod query;
pub mod record;
pub mod reply;
pub mod status;
