//! A minimal TCP reverse proxy: the accepted connection's source is paired
//! with an upstream connection's sink and vice versa, two pipes per
//! client<->upstream pairing, built on [`xps_core::Core::bind_proxy`].
//!
//! Every client that connects to the listen address gets its own fresh
//! outbound connection to the fixed upstream address, then the two are
//! wired full-duplex. Back-pressure on either leg stalls the other side
//! automatically; no application protocol is parsed, only bytes are moved.
//!
//! Run with `cargo run --example proxy -- <listen-port> <upstream-port>`,
//! e.g. against `cargo run --example echo_server` on another port:
//! `cargo run --example proxy -- 9100 8001`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use xps_core::Core;

fn main() -> std::io::Result<()> {
    xps_core::logging::init();
    xps_core::signal::install()?;

    let mut args = std::env::args().skip(1);
    let listen_port: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or(9100);
    let upstream_port: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or(8001);

    let listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), listen_port);
    let upstream_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), upstream_port);

    let mut core = Core::new()?;
    core.bind_proxy(listen_addr, upstream_addr)?;
    core.run()
}
