//! Exercises the proxy configuration end-to-end: a listener bound with
//! `Core::bind_proxy` pairs each accepted client with a fresh connection to
//! a separate upstream echo listener, two pipes per pairing. Bytes a
//! client writes must come back from the upstream echo unchanged, having
//! crossed both legs of the proxy.

mod util;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use xps_core::Core;

#[test]
fn proxied_bytes_round_trip_through_both_pipes() {
    let mut core = Core::new().expect("create core");

    let upstream_listener = core.bind(util::local_loopback()).expect("bind upstream echo listener");
    let upstream_addr = core.listener_addr(upstream_listener).expect("upstream address");

    let proxy_listener = core.bind_proxy(util::local_loopback(), upstream_addr).expect("bind proxy listener");
    let proxy_addr = core.listener_addr(proxy_listener).expect("proxy address");

    util::spawn_core(core);

    let mut client = TcpStream::connect(proxy_addr).expect("connect to proxy");
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    client.set_write_timeout(Some(Duration::from_secs(5))).unwrap();

    client.write_all(b"proxied hello\n").expect("write to proxy");

    let mut buf = vec![0u8; b"proxied hello\n".len()];
    client.read_exact(&mut buf).expect("read proxied echo back");
    assert_eq!(&buf, b"proxied hello\n");
}

#[test]
fn multiple_clients_are_proxied_independently() {
    let mut core = Core::new().expect("create core");

    let upstream_listener = core.bind(util::local_loopback()).expect("bind upstream echo listener");
    let upstream_addr = core.listener_addr(upstream_listener).expect("upstream address");

    let proxy_listener = core.bind_proxy(util::local_loopback(), upstream_addr).expect("bind proxy listener");
    let proxy_addr = core.listener_addr(proxy_listener).expect("proxy address");

    util::spawn_core(core);

    let mut a = TcpStream::connect(proxy_addr).expect("connect client a");
    let mut b = TcpStream::connect(proxy_addr).expect("connect client b");
    for c in [&a, &b] {
        c.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        c.set_write_timeout(Some(Duration::from_secs(5))).unwrap();
    }

    a.write_all(b"from a\n").unwrap();
    b.write_all(b"from b\n").unwrap();

    let mut buf_a = vec![0u8; b"from a\n".len()];
    let mut buf_b = vec![0u8; b"from b\n".len()];
    a.read_exact(&mut buf_a).expect("read a's echo");
    b.read_exact(&mut buf_b).expect("read b's echo");

    assert_eq!(&buf_a, b"from a\n");
    assert_eq!(&buf_b, b"from b\n");
}
