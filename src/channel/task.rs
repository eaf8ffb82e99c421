//! Waiting for readiness of engine sockets.

use super::ChannelInner;
use std::cell::Cell;
use std::io;
use std::os::unix::io::{BorrowedFd, OwnedFd, RawFd};
use std::rc::{Rc, Weak};
use tokio::io::unix::AsyncFd;
use tokio::io::{Interest, Ready};
use tokio::sync::Notify;
use tokio::task::{spawn_local, JoinHandle};
use tracing::{debug, trace};

//------------ Task ----------------------------------------------------------

/// A socket of the engine registered with the event loop.
///
/// The task waits for the socket to become ready in a local task and
/// hands the readiness to the channel. Dropping the task ends the
/// registration.
pub(crate) struct Task {
    fd: RawFd,
    interest: Rc<Cell<Interest>>,
    changed: Rc<Notify>,
    handle: JoinHandle<()>,
}

impl Task {
    /// Starts waiting for a socket.
    ///
    /// The registration uses a duplicate of the descriptor. The engine
    /// stays in charge of the socket itself and may close it at any time
    /// after announcing so.
    pub fn spawn(
        fd: RawFd,
        read: bool,
        write: bool,
        channel: Weak<ChannelInner>,
    ) -> Result<Self, io::Error> {
        // Safety: the engine keeps the socket open while it is announced.
        let owned = unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()?;
        let io = AsyncFd::with_interest(owned, REGISTERED)?;
        let interest = Rc::new(Cell::new(interest(read, write)));
        let changed = Rc::new(Notify::new());
        let handle = spawn_local(poll_socket(
            fd,
            io,
            interest.clone(),
            changed.clone(),
            channel,
        ));
        trace!("registered socket {} ({:?})", fd, interest.get());
        Ok(Task {
            fd,
            interest,
            changed,
            handle,
        })
    }

    #[cfg(test)]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    #[cfg(test)]
    pub fn interest(&self) -> Interest {
        self.interest.get()
    }

    /// Changes what the task waits for.
    pub fn set_interest(&self, read: bool, write: bool) {
        let interest = interest(read, write);
        if interest != self.interest.get() {
            trace!("socket {} now waits for {:?}", self.fd, interest);
            self.interest.set(interest);
            self.changed.notify_one();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        trace!("unregistering socket {}", self.fd);
        self.handle.abort();
    }
}

/// What the reactor is told about a socket up front.
const REGISTERED: Interest =
    Interest::READABLE.add(Interest::WRITABLE).add(Interest::ERROR);

/// Returns what to wait for.
///
/// Errors are always included. A refused UDP query only shows up as an
/// error on the socket, never as readability.
fn interest(read: bool, write: bool) -> Interest {
    let res = match (read, write) {
        (true, true) => Interest::READABLE.add(Interest::WRITABLE),
        (false, true) => Interest::WRITABLE,
        _ => Interest::READABLE,
    };
    res.add(Interest::ERROR)
}

/// Returns the sockets to report for a readiness event.
///
/// Errors report the socket as both readable and writable so the engine
/// notices.
fn ready_fds(fd: RawFd, ready: Ready) -> (Option<RawFd>, Option<RawFd>) {
    if ready.is_error() {
        (Some(fd), Some(fd))
    }
    else {
        (
            ready.is_readable().then_some(fd),
            ready.is_writable().then_some(fd),
        )
    }
}

async fn poll_socket(
    fd: RawFd,
    io: AsyncFd<OwnedFd>,
    interest: Rc<Cell<Interest>>,
    changed: Rc<Notify>,
    channel: Weak<ChannelInner>,
) {
    loop {
        let res = tokio::select! {
            res = io.ready(interest.get()) => {
                Some(res.map(|mut guard| {
                    let ready = guard.ready();
                    guard.clear_ready();
                    ready
                }))
            }
            _ = changed.notified() => None,
        };
        let res = match res {
            Some(res) => res,
            None => continue,
        };
        let channel = match channel.upgrade() {
            Some(channel) => channel,
            None => return,
        };
        match res {
            Ok(ready) => {
                let (read, write) = ready_fds(fd, ready);
                channel.socket_ready(read, write);
            }
            Err(err) => {
                debug!("polling socket {} failed: {}", fd, err);
                channel.socket_ready(Some(fd), Some(fd));
                return;
            }
        }
    }
}

//============ Testing =======================================================
