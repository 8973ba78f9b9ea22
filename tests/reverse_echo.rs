//! Exercises line-reversing echo through the public seam `Core` exposes
//! for a custom sink handler
//! (`sink_buffered_len`/`sink_peek`/`sink_discard`/`send_to_connection`),
//! the same mechanism `demos/reverse_echo.rs` uses. This is deliberately a
//! self-contained copy of that demo's handler rather than a shared `mod`:
//! each integration test file here is its own binary, and the handler is
//! small enough that duplicating it keeps this test independent of the
//! demo staying unchanged.

mod util;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use xps_core::{Core, ConnectionHandle};

struct Pending {
    remaining: Vec<u8>,
    original_len: usize,
}

thread_local! {
    static PENDING: RefCell<HashMap<ConnectionHandle, Pending>> = RefCell::new(HashMap::new());
}

fn reverse_excluding_trailing_newline(data: &[u8]) -> Vec<u8> {
    let (body, had_newline) = match data.split_last() {
        Some((b'\n', body)) => (body, true),
        _ => (data, false),
    };
    let mut out: Vec<u8> = body.iter().rev().copied().collect();
    if had_newline {
        out.push(b'\n');
    }
    out
}

fn reversing_sink_handler(core: &mut Core, handle: ConnectionHandle) {
    PENDING.with(|cell| {
        let mut pending = cell.borrow_mut();

        if !pending.contains_key(&handle) {
            let Some(len) = core.sink_buffered_len(handle) else { return };
            if len == 0 {
                return;
            }
            let Some(chunk) = core.sink_peek(handle, len) else { return };
            pending.insert(handle, Pending { remaining: reverse_excluding_trailing_newline(&chunk), original_len: len });
        }

        let entry = pending.get_mut(&handle).expect("just inserted or already present");
        match core.send_to_connection(handle, &entry.remaining) {
            Ok(n) => {
                entry.remaining.drain(..n);
                if entry.remaining.is_empty() {
                    let original_len = entry.original_len;
                    pending.remove(&handle);
                    let _ = core.sink_discard(handle, original_len);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => core.mark_sink_not_ready(handle),
            Err(_) => {
                pending.remove(&handle);
            }
        }
    });
}

#[test]
fn reversing_sink_handler_reverses_line_excluding_trailing_newline() {
    let mut core = Core::new().expect("create core");
    let listener = core.bind_with_sink_handler(util::local_loopback(), reversing_sink_handler).expect("bind listener");
    let addr = core.listener_addr(listener).expect("listener address");
    util::spawn_core(core);

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(b"hello\n").expect("write line");

    let mut buf = [0u8; 6];
    stream.read_exact(&mut buf).expect("read reversed line");
    assert_eq!(&buf, b"olleh\n");
}
