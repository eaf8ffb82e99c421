//! Process-wide resolver library state.
//!
//! Some resolver engines need global initialization before the first
//! channel is created and cleanup after the last one is gone. A
//! [`Library`] counts the channels using it. The first
//! [`acquire`][Library::acquire] runs the engine factory's global init and
//! dropping the last [`LibraryRef`] runs its cleanup.
//!
//! Channels may be created on different threads, each with its own event
//! loop, so the counter sits behind a mutex.

use crate::engine::EngineFactory;
use crate::status::Status;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

//------------ Library -------------------------------------------------------

/// A reference counted process-wide resource.
#[derive(Debug, Default)]
pub struct Library {
    refs: Mutex<usize>,
}

static GLOBAL: Library = Library::new();

impl Library {
    /// Creates a new, unused library.
    pub const fn new() -> Self {
        Library {
            refs: Mutex::new(0),
        }
    }

    /// Returns the library shared by all channels of the process.
    pub fn global() -> &'static Library {
        &GLOBAL
    }

    /// Acquires a reference to the library.
    ///
    /// If this is the first reference, the factory's global initialization
    /// runs while the lock is held. If it fails, no reference is taken.
    pub fn acquire(
        &'static self,
        factory: Rc<dyn EngineFactory>,
    ) -> Result<LibraryRef, Status> {
        let mut refs = self.lock();
        if *refs == 0 {
            debug!("initializing resolver library");
            factory.library_init()?;
        }
        *refs += 1;
        Ok(LibraryRef {
            library: self,
            factory,
        })
    }

    /// Returns the number of references currently held.
    #[cfg(test)]
    pub(crate) fn refs(&self) -> usize {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<usize> {
        // The counter stays consistent even if a holder panicked.
        self.refs.lock().unwrap_or_else(|err| err.into_inner())
    }
}

//------------ LibraryRef ----------------------------------------------------

/// A held reference to a [`Library`].
///
/// Dropping the value releases the reference.
pub struct LibraryRef {
    library: &'static Library,
    factory: Rc<dyn EngineFactory>,
}

impl Drop for LibraryRef {
    fn drop(&mut self) {
        let mut refs = self.library.lock();
        assert!(*refs > 0, "library reference count underflow");
        *refs -= 1;
        if *refs == 0 {
            debug!("cleaning up resolver library");
            self.factory.library_cleanup();
        }
    }
}

//============ Testing =======================================================
