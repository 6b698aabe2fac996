//! # taskserv-net - blocking TCP request/response server
//!
//! A connection-oriented server built on plain OS threads and blocking
//! sockets: one dedicated accept thread, and one [`taskserv_pool`] worker
//! per live connection running a read / handle / respond loop until the
//! peer disconnects or the server stops.
//!
//! No readiness model, no framing, no TLS. One `recv` is one logical
//! request; the handler's bytes are written back whole.
//!
//! ## Shutdown model
//!
//! All blocking calls (`accept`, `recv`, `send`) are interrupted by
//! `stop()` issuing `shutdown(2)` on the underlying descriptor from
//! another thread. That is the designed cancellation primitive, not an
//! accident: the blocked call returns an error, the owning loop treats it
//! as "exit cleanly" and closes its own descriptor.
//!
//! ## Capacity model
//!
//! A service loop occupies its pool worker for the connection's entire
//! lifetime, so [`ServerConfig::workers`] is a hard upper bound on
//! concurrently served peers. Connections that cannot be dispatched
//! because the task queue is at its bound are rejected and closed, never
//! queued without limit.

mod client;
mod config;
mod error;
mod registry;
mod server;
mod sock;

pub use client::TcpClient;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{Handler, TcpServer};
pub use sock::LISTEN_BACKLOG;
