//! Socket helpers: errno classification, best-effort options, full writes.

use nix::errno::Errno;
use nix::sys::socket::{send, setsockopt, sockopt, MsgFlags};
use std::os::fd::{AsFd, AsRawFd, RawFd};

use taskserv_core::twarn;

/// Listen backlog. Fixed, not externally configurable.
pub const LISTEN_BACKLOG: i32 = 15;

/// Accept-loop conditions that mean "log and try again".
///
/// EWOULDBLOCK aliases EAGAIN on Linux, so one arm covers both.
pub(crate) fn accept_transient(err: Errno) -> bool {
    matches!(err, Errno::EAGAIN | Errno::EINTR | Errno::ECONNABORTED)
}

/// recv/send conditions that mean "retry the same call".
pub(crate) fn io_transient(err: Errno) -> bool {
    matches!(err, Errno::EAGAIN | Errno::EINTR)
}

/// Best-effort TCP_NODELAY on an accepted connection.
///
/// Failure is logged and ignored; latency tuning is not worth killing
/// the connection over.
pub(crate) fn set_nodelay<F: AsFd>(sock: &F) {
    if let Err(err) = setsockopt(sock, sockopt::TcpNoDelay, &true) {
        twarn!(
            "failed to set TCP_NODELAY on fd {}: {}",
            sock.as_fd().as_raw_fd(),
            err
        );
    }
}

/// Write all of `data` to `fd`, retrying transient errors and partial
/// writes until everything is on the wire.
pub(crate) fn send_all(fd: RawFd, data: &[u8]) -> Result<(), Errno> {
    let mut written = 0;
    while written < data.len() {
        match send(fd, &data[written..], MsgFlags::empty()) {
            // A stream socket never reports zero progress for a non-empty
            // buffer unless the peer is gone; treat it as such.
            Ok(0) => return Err(Errno::EPIPE),
            Ok(n) => written += n,
            Err(err) if io_transient(err) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
