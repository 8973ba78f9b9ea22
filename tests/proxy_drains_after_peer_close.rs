//! Exercises the two-connection proxy configuration (`Core::bind_proxy`)
//! when the upstream leg sends a fixed payload then closes immediately. The
//! proxy's upstream-side connection observes `recv() == 0` and runs the
//! consolidated close, but the pipe carrying the upstream's bytes toward
//! the client persists — it keeps draining until empty — so the client
//! must still receive every byte the upstream sent before the proxy's
//! client-side connection itself tears down and the client sees a clean
//! EOF.

mod util;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use xps_core::Core;

#[test]
fn client_receives_full_upstream_payload_before_eof_after_upstream_closes() {
    let payload = b"upstream sent this before hanging up\n".to_vec();

    let raw_upstream = TcpListener::bind("127.0.0.1:0").expect("bind raw upstream");
    let upstream_addr = raw_upstream.local_addr().expect("upstream addr");

    let payload_for_thread = payload.clone();
    thread::spawn(move || {
        let (mut stream, _) = raw_upstream.accept().expect("accept from proxy");
        stream.write_all(&payload_for_thread).expect("write payload");
        // Dropping `stream` here closes it immediately after the write: the
        // proxy's upstream-side source should see recv() == 0 right after
        // these bytes land in its pipe, not after some later idle period.
    });

    let mut core = Core::new().expect("create core");
    let proxy_listener = core.bind_proxy(util::local_loopback(), upstream_addr).expect("bind proxy listener");
    let proxy_addr = core.listener_addr(proxy_listener).expect("proxy address");
    util::spawn_core(core);

    let mut client = TcpStream::connect(proxy_addr).expect("connect to proxy");
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut received = Vec::new();
    client.read_to_end(&mut received).expect("read until the proxy closes our side");

    assert_eq!(received, payload, "every upstream byte must arrive before the proxy-side EOF");
}
