//! Four loopback echo listeners on ports 8001-8004. Every accepted
//! connection's own source feeds its own sink (the echo/loopback wiring),
//! so whatever a client sends comes straight back.
//!
//! Run with `cargo run --example echo_server`, then e.g. `nc 127.0.0.1 8001`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use xps_core::Core;

fn main() -> std::io::Result<()> {
    xps_core::logging::init();
    xps_core::signal::install()?;

    let addrs: Vec<SocketAddr> = (8001..=8004).map(|port| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).collect();

    let mut core = Core::new()?;
    core.start(&addrs)
}
