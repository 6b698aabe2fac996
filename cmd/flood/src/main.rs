//! Load generator
//!
//! Hammers a request/response server with many concurrent clients and
//! reports throughput. Pairs with the echo binary:
//!
//!     ./target/release/echo 9000 &
//!     ./target/release/flood 9000 50 1000
//!
//! Arguments: [port] [clients] [requests-per-client]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskserv_net::TcpClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    println!("=== taskserv flood ===\n");

    let args: Vec<String> = std::env::args().collect();
    let port: u16 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(9000);
    let clients: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let requests: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(1000);

    println!(
        "Target: 127.0.0.1:{}, {} clients x {} requests",
        port, clients, requests
    );

    let ok = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..clients)
        .map(|id| {
            let ok = ok.clone();
            let failed = failed.clone();
            let rejected = rejected.clone();
            std::thread::spawn(move || {
                let client = match TcpClient::connect(Ipv4Addr::LOCALHOST, port) {
                    Ok(c) => c,
                    Err(err) => {
                        eprintln!("client {}: connect failed: {}", id, err);
                        rejected.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };

                let payload = format!("client-{}-payload", id).into_bytes();
                for _ in 0..requests {
                    match client.request(&payload, REQUEST_TIMEOUT) {
                        Ok(reply) if reply == payload => {
                            ok.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(reply) if reply.is_empty() => {
                            // Orderly close: turned away by a saturated
                            // pool, or the server stopped.
                            rejected.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                        Ok(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            eprintln!("client {}: request failed: {}", id, err);
                            failed.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    let elapsed = start.elapsed();
    let ok = ok.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    let rejected = rejected.load(Ordering::Relaxed);

    println!("\n=== Results ===");
    println!("Succeeded:  {}", ok);
    println!("Failed:     {}", failed);
    println!("Rejected:   {}", rejected);
    println!("Elapsed:    {:?}", elapsed);
    println!(
        "Throughput: {:.0} req/sec",
        ok as f64 / elapsed.as_secs_f64()
    );
}
