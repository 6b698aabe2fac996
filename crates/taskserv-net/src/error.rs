//! Server error types.

use nix::errno::Errno;
use std::fmt;

/// Result type for server setup operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Synchronous `start()` failures. Everything past setup is handled
/// inside the accept and service loops and never surfaces here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    /// socket(2) failed.
    SocketCreate(Errno),

    /// Setting SO_REUSEADDR before bind failed.
    SetSockOpt(Errno),

    /// bind(2) failed (port in use, privileged port, ...).
    Bind(Errno),

    /// listen(2) failed.
    Listen(Errno),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::SocketCreate(e) => write!(f, "failed to create listening socket: {}", e),
            ServerError::SetSockOpt(e) => write!(f, "failed to set SO_REUSEADDR: {}", e),
            ServerError::Bind(e) => write!(f, "bind failed: {}", e),
            ServerError::Listen(e) => write!(f, "listen failed: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ServerError::Bind(Errno::EADDRINUSE);
        let msg = format!("{}", e);
        assert!(msg.starts_with("bind failed"));
        assert!(msg.contains("EADDRINUSE") || msg.contains("in use"));
    }
}
