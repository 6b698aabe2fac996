//! The TCP server: accept thread, per-connection service loops, shutdown.
//!
//! Thread roles:
//!
//! - caller thread: `start()` / `stop()` / introspection
//! - one `acceptor` thread: blocking `accept`, registration, dispatch
//! - pool workers: one service loop per live connection
//!
//! `stop()` interrupts all of them by shutting the descriptors down from
//! outside; no blocking call here ever carries a timeout.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use nix::sys::socket::{
    accept, bind, getsockname, listen, recv, setsockopt, shutdown, socket, sockopt,
    AddressFamily, Backlog, MsgFlags, Shutdown, SockFlag, SockType, SockaddrIn,
};

use taskserv_core::{tdebug, terror, tinfo, twarn, ScopeGuard};
use taskserv_pool::ThreadPool;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::ConnRegistry;
use crate::sock::{accept_transient, io_transient, send_all, set_nodelay, LISTEN_BACKLOG};

/// Maps one received payload to one response payload.
///
/// Runs on a pool worker and occupies it for the call's duration (plus
/// the rest of the connection's lifetime), so it must not block
/// indefinitely. A panic closes only the panicking connection.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, conn: RawFd, data: &[u8]) -> Vec<u8>;
}

/// Plain closures work as handlers.
impl<F> Handler for F
where
    F: Fn(RawFd, &[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    fn handle(&self, conn: RawFd, data: &[u8]) -> Vec<u8> {
        self(conn, data)
    }
}

/// State shared with the accept thread and every service loop.
struct ServerCore {
    handler: Box<dyn Handler>,

    /// Advisory state flag. Visibility only - actual unblocking happens
    /// through descriptor shutdown, never through this flag.
    running: AtomicBool,

    /// The listening socket, present while a listener exists. Exactly one
    /// taker closes it: `stop()` (after joining the accept thread) or the
    /// accept loop itself on a fatal error. The accept thread blocks on a
    /// raw copy, which stays valid because `stop()` keeps the handle open
    /// until that thread has been joined.
    listener: Mutex<Option<OwnedFd>>,

    registry: ConnRegistry,
    recv_buffer: usize,
}

/// An accepted connection, registered for the shutdown interrupt.
///
/// Unregistration travels with ownership: `drop` removes the fd from the
/// registry first and only then lets the descriptor close, on every exit
/// path - service loop return, handler panic, admission rejection. A
/// registered fd is therefore always open.
struct Conn {
    fd: OwnedFd,
    core: Arc<ServerCore>,
}

impl Conn {
    fn raw(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        // Runs before `self.fd` closes.
        self.core.registry.remove(self.raw());
        tinfo!("client disconnected, fd {}", self.raw());
    }
}

/// Concurrent request/response server over raw TCP.
///
/// See the crate docs for the capacity and shutdown model.
pub struct TcpServer {
    core: Arc<ServerCore>,

    /// Deliberately outside `ServerCore`: service tasks hold the core,
    /// and a task must never own the pool that is executing it, or the
    /// pool's teardown could end up joining its own worker.
    pool: Arc<ThreadPool>,

    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServer {
    /// Server with default configuration.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self::with_config(handler, ServerConfig::default())
    }

    pub fn with_config<H: Handler>(handler: H, config: ServerConfig) -> Self {
        let pool = ThreadPool::new(config.workers);
        pool.set_queue_limit(config.queue_limit);
        Self {
            core: Arc::new(ServerCore {
                handler: Box::new(handler),
                running: AtomicBool::new(false),
                listener: Mutex::new(None),
                registry: ConnRegistry::new(),
                recv_buffer: config.recv_buffer,
            }),
            pool: Arc::new(pool),
            accept_thread: Mutex::new(None),
        }
    }

    /// Bind, listen and spawn the accept thread. Non-blocking: returns as
    /// soon as the listener is up.
    ///
    /// Calling `start` on a running server is a no-op success; no second
    /// listener is created. `port` 0 binds an ephemeral port, readable
    /// via [`TcpServer::local_port`].
    pub fn start(&self, port: u16) -> ServerResult<()> {
        if self.core.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Roll the state flag back on every setup error path.
        let core = Arc::clone(&self.core);
        let rollback = ScopeGuard::new(move || core.running.store(false, Ordering::SeqCst));

        let listener = socket(AddressFamily::Inet, SockType::Stream, SockFlag::empty(), None)
            .map_err(ServerError::SocketCreate)?;
        setsockopt(&listener, sockopt::ReuseAddr, &true).map_err(ServerError::SetSockOpt)?;

        let addr = SockaddrIn::new(0, 0, 0, 0, port);
        bind(listener.as_raw_fd(), &addr).map_err(ServerError::Bind)?;

        let backlog = Backlog::new(LISTEN_BACKLOG).map_err(ServerError::Listen)?;
        listen(&listener, backlog).map_err(ServerError::Listen)?;

        let listen_fd = listener.as_raw_fd();
        *self.core.listener.lock().unwrap() = Some(listener);

        let core = Arc::clone(&self.core);
        let pool = Arc::clone(&self.pool);
        let handle = thread::Builder::new()
            .name("acceptor".to_string())
            .spawn(move || accept_loop(core, pool, listen_fd))
            .expect("failed to spawn acceptor thread");
        *self.accept_thread.lock().unwrap() = Some(handle);

        rollback.defuse();
        tinfo!(
            "server listening on port {}",
            self.local_port().unwrap_or(port)
        );
        Ok(())
    }

    /// Stop the server. Idempotent; never fails.
    ///
    /// Unblocks the accept thread and every service loop by shutting
    /// their descriptors down, then joins the accept thread. Service
    /// loops finish unwinding asynchronously on the pool - their sockets
    /// are already dead, so their next I/O call exits the loop.
    pub fn stop(&self) {
        let was_running = self.core.running.swap(false, Ordering::SeqCst);
        if was_running {
            tinfo!("stopping server");
        }

        // Take the listener so nothing else can close it underneath us,
        // shut it down to unblock the accept thread, and keep the handle
        // open until that thread has been joined.
        let listener = self.core.listener.lock().unwrap().take();
        if let Some(listener) = &listener {
            let _ = shutdown(listener.as_raw_fd(), Shutdown::Both);
        }

        self.core.registry.shutdown_all();

        let handle = self.accept_thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        drop(listener);
        if was_running {
            tinfo!("server stopped");
        }
    }

    /// Current state; safe to call concurrently with `start`/`stop`.
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Port the listener is bound to, when one exists.
    pub fn local_port(&self) -> Option<u16> {
        let listener = self.core.listener.lock().unwrap();
        listener
            .as_ref()
            .and_then(|l| getsockname::<SockaddrIn>(l.as_raw_fd()).ok())
            .map(|addr| addr.port())
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.core.registry.len()
    }

    /// The worker pool backing the service loops.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accept thread body. Blocks on a raw copy of the listening descriptor;
/// the owned handle stays in the core, closed by `stop()` after this
/// thread exits, or taken and closed here on a fatal accept error.
fn accept_loop(core: Arc<ServerCore>, pool: Arc<ThreadPool>, listen_fd: RawFd) {
    tdebug!("accept loop started on fd {}", listen_fd);
    while core.running.load(Ordering::SeqCst) {
        match accept(listen_fd) {
            Ok(fd) => {
                // Safety: accept(2) handed us a fresh descriptor; nothing
                // else owns it yet.
                let sock = unsafe { OwnedFd::from_raw_fd(fd) };
                if !core.running.load(Ordering::SeqCst) {
                    break; // raced with stop(); sock closes on drop
                }
                dispatch(&core, &pool, sock);
            }
            Err(err) if accept_transient(err) => {
                tdebug!("transient accept error: {}", err);
            }
            Err(err) => {
                // stop() shutting the listener down lands here too; only
                // a failure while still running is worth reporting.
                if core.running.load(Ordering::SeqCst) {
                    terror!("fatal accept error, accept loop terminating: {}", err);
                }
                break;
            }
        }
    }
    // Fatal-error exit owns the listener teardown; on stop() the flag is
    // already clear and stop() closes it after joining this thread.
    if core.running.load(Ordering::SeqCst) {
        core.listener.lock().unwrap().take();
    }
    tdebug!("accept loop stopped");
}

/// Register an accepted connection and hand it to the pool.
fn dispatch(core: &Arc<ServerCore>, pool: &ThreadPool, sock: OwnedFd) {
    let fd = sock.as_raw_fd();
    set_nodelay(&sock);
    if !core.registry.insert(fd) {
        // A closed fd left registered would break the shutdown interrupt.
        terror!("fd {} already registered; dropping connection", fd);
        return;
    }
    tinfo!("client connected on fd {}", fd);

    let conn = Conn {
        fd: sock,
        core: Arc::clone(core),
    };
    if pool.submit(move || service_loop(conn)).is_none() {
        // Admission control: queue at its bound or pool shutting down.
        // Reject outright rather than queue accepted sockets without
        // limit; dropping the rejected task unregistered and closed the
        // descriptor, in that order.
        twarn!("connection on fd {} rejected: worker pool saturated", fd);
    }
}

/// Per-connection loop: receive, handle, respond, until the peer goes
/// away, an unrecoverable error occurs, or the server stops.
///
/// Dropping `conn` on any exit path (panics included) unregisters the fd
/// and then closes it.
fn service_loop(conn: Conn) {
    let fd = conn.raw();
    let mut buf = vec![0u8; conn.core.recv_buffer];
    while conn.core.running.load(Ordering::SeqCst) {
        let len = match recv(fd, &mut buf, MsgFlags::empty()) {
            Ok(0) => break, // orderly peer shutdown
            Ok(len) => len,
            Err(err) if io_transient(err) => continue,
            Err(err) => {
                tdebug!("receive failed on fd {}: {}", fd, err);
                break;
            }
        };

        let response = conn.core.handler.handle(fd, &buf[..len]);
        if let Err(err) = send_all(fd, &response) {
            twarn!("send failed on fd {}: {}", fd, err);
            break;
        }
    }
}
