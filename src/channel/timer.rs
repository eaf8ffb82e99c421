//! The idle timer driving engine timeouts.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::{spawn_local, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// The longest period between two ticks.
const MAX_PERIOD_MS: u32 = 1000;

//------------ IdleTimer -----------------------------------------------------

/// A repeating timer whose next tick can be pushed out.
///
/// While active, the timer calls its callback every period. Calling
/// [`again`][Self::again] restarts the current period so that the timer
/// only fires after a period without any socket activity.
pub(crate) struct IdleTimer {
    period: Duration,
    deadline: Rc<Cell<Instant>>,
    handle: RefCell<Option<JoinHandle<()>>>,
}

impl IdleTimer {
    /// Creates an inactive timer for an engine with the given timeout.
    pub fn new(timeout_ms: Option<u32>) -> Self {
        let period = Self::period(timeout_ms);
        IdleTimer {
            period,
            deadline: Rc::new(Cell::new(Instant::now() + period)),
            handle: RefCell::new(None),
        }
    }

    /// Returns the period for an engine timeout in milliseconds.
    ///
    /// This is the timeout itself but at most one second and at least one
    /// millisecond.
    pub fn period(timeout_ms: Option<u32>) -> Duration {
        let ms = match timeout_ms {
            None => MAX_PERIOD_MS,
            Some(ms) if ms > MAX_PERIOD_MS => MAX_PERIOD_MS,
            Some(0) => 1,
            Some(ms) => ms,
        };
        Duration::from_millis(ms.into())
    }

    pub fn is_active(&self) -> bool {
        self.handle.borrow().is_some()
    }

    /// Starts the timer unless it is already running.
    ///
    /// Must be called from within a [`LocalSet`](tokio::task::LocalSet).
    pub fn start(&self, on_tick: impl Fn() + 'static) {
        let mut handle = self.handle.borrow_mut();
        if handle.is_some() {
            return;
        }
        trace!("starting idle timer with period {:?}", self.period);
        let period = self.period;
        let deadline = self.deadline.clone();
        deadline.set(Instant::now() + period);
        *handle = Some(spawn_local(async move {
            loop {
                sleep_until(deadline.get()).await;
                let now = Instant::now();
                if now < deadline.get() {
                    continue;
                }
                deadline.set(now + period);
                on_tick();
            }
        }));
    }

    /// Restarts the current period if the timer is active.
    pub fn again(&self) {
        if self.is_active() {
            self.deadline.set(Instant::now() + self.period);
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.borrow_mut().take() {
            trace!("stopping idle timer");
            handle.abort();
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.stop()
    }
}

//============ Testing =======================================================
