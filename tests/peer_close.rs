//! Exercises the peer-EOF half of the source handler and the consolidated
//! close it triggers. The self-looped echo wiring used here means a single
//! `Connection` owns both endpoints of its pipe, so closing on EOF tears
//! down the whole connection at once rather than the asymmetric "sink
//! keeps draining after source closes" case a two-connection proxy pairing
//! hits instead. See `tests/proxy_drains_after_peer_close.rs` for that
//! asymmetric case, exercised through `Core::bind_proxy`/`Core::pair`.

mod util;

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use xps_core::Core;

#[test]
fn half_close_after_echo_still_closes_connection_cleanly() {
    let mut core = Core::new().expect("create core");
    let listener = core.bind(util::local_loopback()).expect("bind listener");
    let addr = core.listener_addr(listener).expect("listener address");
    util::spawn_core(core);

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    stream.write_all(b"partial payload").expect("write before half-close");

    let mut echoed = vec![0u8; b"partial payload".len()];
    stream.read_exact(&mut echoed).expect("read echoed bytes before closing");
    assert_eq!(echoed, b"partial payload");

    stream.shutdown(Shutdown::Write).expect("half-close the write side");

    // The server's source handler now observes recv() == 0 and runs the
    // consolidated close, which (in this self-looped wiring) tears down
    // both pipe endpoints together and closes the socket — so the client's
    // read side should observe a clean EOF rather than hang or error.
    let mut trailer = Vec::new();
    stream.read_to_end(&mut trailer).expect("read to EOF after peer close");
    assert!(trailer.is_empty(), "no further bytes expected once the connection is torn down");
}
