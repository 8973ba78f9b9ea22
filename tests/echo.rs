//! End-to-end exercise of the loopback echo configuration: an accepted
//! connection's own source feeds its own sink, so whatever a client sends
//! comes straight back unmodified.

mod util;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use xps_core::Core;

#[test]
fn loopback_echo_returns_identical_bytes() {
    let mut core = Core::new().expect("create core");
    let listener = core.bind(util::local_loopback()).expect("bind listener");
    let addr = core.listener_addr(listener).expect("listener address");
    util::spawn_core(core);

    let mut stream = TcpStream::connect(addr).expect("connect to loopback listener");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(b"hello, world").expect("write to echo connection");

    let mut buf = [0u8; 12];
    stream.read_exact(&mut buf).expect("read echoed bytes");
    assert_eq!(&buf, b"hello, world");
}

#[test]
fn loopback_echo_handles_several_small_writes() {
    let mut core = Core::new().expect("create core");
    let listener = core.bind(util::local_loopback()).expect("bind listener");
    let addr = core.listener_addr(listener).expect("listener address");
    util::spawn_core(core);

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    for chunk in [&b"one "[..], &b"two "[..], &b"three"[..]] {
        stream.write_all(chunk).expect("write chunk");
        let mut buf = vec![0u8; chunk.len()];
        stream.read_exact(&mut buf).expect("read echoed chunk");
        assert_eq!(buf, chunk);
    }
}
