//! Blocking TCP client.
//!
//! The testing and benchmarking counterpart to the server: plain
//! blocking calls, one socket per client, no internal threads. Mainly
//! useful for the round-trip [`TcpClient::request`] call, which is how
//! the flood tool drives a server.

use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::socket::{
    connect, recv, setsockopt, shutdown, socket, sockopt, AddressFamily, MsgFlags, Shutdown,
    SockFlag, SockType, SockaddrIn,
};
use nix::sys::time::TimeVal;

use crate::config::DEFAULT_RECV_BUFFER;
use crate::sock::{send_all, set_nodelay};

#[derive(Debug)]
pub struct TcpClient {
    sock: OwnedFd,
}

impl TcpClient {
    /// Open a blocking connection to `ip:port`.
    pub fn connect(ip: Ipv4Addr, port: u16) -> Result<Self, Errno> {
        let sock = socket(AddressFamily::Inet, SockType::Stream, SockFlag::empty(), None)?;
        let [a, b, c, d] = ip.octets();
        connect(sock.as_raw_fd(), &SockaddrIn::new(a, b, c, d, port))?;
        set_nodelay(&sock);
        Ok(Self { sock })
    }

    /// Send the whole payload, retrying partial writes.
    pub fn send(&self, data: &[u8]) -> Result<(), Errno> {
        send_all(self.sock.as_raw_fd(), data)
    }

    /// One blocking read. Returns 0 on an orderly server-side close.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        loop {
            match recv(self.sock.as_raw_fd(), buf, MsgFlags::empty()) {
                Err(err) if err == Errno::EINTR => continue,
                other => return other,
            }
        }
    }

    /// Send a request and wait up to `timeout` for the response.
    ///
    /// A quiet server surfaces as `EAGAIN` when the receive timeout
    /// expires. The timeout sticks to the socket, so the most recent
    /// call's value governs any later bare `recv`.
    pub fn request(&self, data: &[u8], timeout: Duration) -> Result<Vec<u8>, Errno> {
        self.send(data)?;

        let tv = TimeVal::new(
            timeout.as_secs() as i64,
            i64::from(timeout.subsec_micros()),
        );
        setsockopt(&self.sock, sockopt::ReceiveTimeout, &tv)?;

        let mut buf = vec![0u8; DEFAULT_RECV_BUFFER];
        loop {
            match recv(self.sock.as_raw_fd(), &mut buf, MsgFlags::empty()) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                // With SO_RCVTIMEO armed, EAGAIN means the deadline hit;
                // only bare EINTR is worth retrying.
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Shut both directions down; the descriptor itself closes on drop.
    pub fn shutdown(&self) -> Result<(), Errno> {
        shutdown(self.sock.as_raw_fd(), Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_refused() {
        // Port 1 on loopback is essentially never listening.
        let err = TcpClient::connect(Ipv4Addr::LOCALHOST, 1).unwrap_err();
        assert_eq!(err, Errno::ECONNREFUSED);
    }
}
