//! Live-connection registry.
//!
//! A lock-guarded set of the raw descriptors currently served. The accept
//! thread inserts, each service loop removes itself on exit, and `stop()`
//! walks the set to `shutdown(2)` every entry - the cross-thread
//! interrupt that unblocks loops stuck in `recv`/`send`.
//!
//! Only raw fds live here. The owning service loop keeps the `OwnedFd`
//! and performs the sole close, always after unregistering, so every
//! registered descriptor is open and no close happens twice.

use nix::sys::socket::{shutdown, Shutdown};
use std::collections::HashSet;
use std::os::fd::RawFd;
use std::sync::Mutex;

use taskserv_core::ttrace;

pub(crate) struct ConnRegistry {
    conns: Mutex<HashSet<RawFd>>,
}

impl ConnRegistry {
    pub(crate) fn new() -> Self {
        Self {
            conns: Mutex::new(HashSet::new()),
        }
    }

    /// Register an accepted descriptor. Returns false on a duplicate,
    /// which would mean an fd was closed while still registered.
    pub(crate) fn insert(&self, fd: RawFd) -> bool {
        self.conns.lock().unwrap().insert(fd)
    }

    /// Unregister a descriptor; called by its service loop on every exit
    /// path, before the descriptor closes.
    pub(crate) fn remove(&self, fd: RawFd) -> bool {
        self.conns.lock().unwrap().remove(&fd)
    }

    pub(crate) fn len(&self) -> usize {
        self.conns.lock().unwrap().len()
    }

    /// shutdown(2) every registered descriptor to unblock its loop.
    ///
    /// Errors (already shut down, reset underneath us) are no-ops; the
    /// loops close their own descriptors when they observe the failure.
    pub(crate) fn shutdown_all(&self) {
        let conns = self.conns.lock().unwrap();
        for &fd in conns.iter() {
            ttrace!("interrupting service loop on fd {}", fd);
            let _ = shutdown(fd, Shutdown::Both);
        }
    }
}
