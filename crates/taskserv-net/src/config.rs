//! Server configuration
//!
//! Compiled defaults with environment overrides, builder-style.
//!
//! # Environment Variables
//!
//! - `TSV_WORKERS` - pool worker threads
//! - `TSV_QUEUE_LIMIT` - task-queue admission bound
//! - `TSV_RECV_BUFFER` - per-connection receive buffer in bytes
//!
//! # Example
//!
//! ```ignore
//! use taskserv_net::ServerConfig;
//!
//! // Defaults plus env overrides
//! let config = ServerConfig::from_env();
//!
//! // Or programmatic
//! let config = ServerConfig::default().workers(8).queue_limit(64);
//! ```

use taskserv_core::env::env_get;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 30;

/// Default per-connection receive buffer: 10 KiB.
pub const DEFAULT_RECV_BUFFER: usize = 10 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Pool worker threads. A service loop occupies its worker for the
    /// connection's whole lifetime, so this is also the hard upper bound
    /// on concurrently served peers.
    pub workers: usize,

    /// Admission bound on the pool's task queue. Accepted connections
    /// that would exceed it are rejected and closed. Unbounded by
    /// default.
    pub queue_limit: usize,

    /// Receive buffer size. One `recv` of up to this many bytes is one
    /// logical request; longer peer writes arrive as separate chunks.
    pub recv_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_limit: usize::MAX,
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Defaults with any `TSV_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self {
            workers: env_get("TSV_WORKERS", DEFAULT_WORKERS),
            queue_limit: env_get("TSV_QUEUE_LIMIT", usize::MAX),
            recv_buffer: env_get("TSV_RECV_BUFFER", DEFAULT_RECV_BUFFER),
        }
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn queue_limit(mut self, n: usize) -> Self {
        self.queue_limit = n;
        self
    }

    pub fn recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_limit, usize::MAX);
        assert_eq!(config.recv_buffer, 10 * 1024);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::default()
            .workers(4)
            .queue_limit(16)
            .recv_buffer(512);
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_limit, 16);
        assert_eq!(config.recv_buffer, 512);
    }
}
