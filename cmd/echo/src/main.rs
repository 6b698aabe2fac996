//! TCP echo server
//!
//! Minimal end-to-end demo: a pool-backed server that sends every
//! payload straight back.
//!
//! Usage:
//!     ./target/release/echo [port]
//!
//! Test with:
//!     echo "hello" | nc -q1 localhost 9000
//!
//! Configuration comes from the environment (TSV_WORKERS,
//! TSV_QUEUE_LIMIT, TSV_RECV_BUFFER, TSV_LOG_LEVEL). Ctrl-C stops the
//! server cleanly, closing every live connection.

use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::{signal, SigHandler, Signal};

use taskserv_core::{log, tinfo};
use taskserv_net::{ServerConfig, TcpServer};

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: c_int) {
    STOP.store(true, Ordering::Relaxed);
}

fn main() {
    log::init();

    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(9000);

    unsafe {
        signal(Signal::SIGINT, SigHandler::Handler(handle_signal))
            .expect("failed to install SIGINT handler");
        signal(Signal::SIGTERM, SigHandler::Handler(handle_signal))
            .expect("failed to install SIGTERM handler");
    }

    let config = ServerConfig::from_env();
    tinfo!(
        "echo: {} workers, queue limit {}, {} byte buffers",
        config.workers,
        config.queue_limit,
        config.recv_buffer
    );

    let server = TcpServer::with_config(
        |_conn: std::os::fd::RawFd, data: &[u8]| data.to_vec(),
        config,
    );
    if let Err(err) = server.start(port) {
        eprintln!("echo: failed to start on port {}: {}", port, err);
        std::process::exit(1);
    }

    println!(
        "echo: listening on port {} (Ctrl-C to stop)",
        server.local_port().unwrap_or(port)
    );

    while !STOP.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    println!("\necho: shutting down ({} live connections)", server.connection_count());
    server.stop();
    println!("echo: done.");
}
