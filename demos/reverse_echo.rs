//! Line-reversing echo: the same loopback wiring as `demos/echo_server.rs`,
//! with the sink handler swapped out via `xps_core::set_sink_handler` to
//! reverse each buffered chunk before it goes back to the client
//! (`"hello\n"` in, `"olleh\n"` back).
//!
//! The crate's own `Connection` stays a verbatim byte mover; this demo
//! layers the reversal entirely on top of the public
//! `sink_buffered_len`/`sink_peek`/`sink_discard`/`send_to_connection` seam
//! `Core` exposes for exactly this purpose.
//!
//! Run with `cargo run --example reverse_echo`, then e.g.
//! `printf 'hello\n' | nc 127.0.0.1 9001`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use xps_core::{Core, ConnectionHandle};

/// A reversed chunk not yet fully flushed to the socket, plus how many
/// original (untransformed) bytes it came from — that's what gets discarded
/// from the real pipe once `remaining` is fully sent. Kept per-connection
/// rather than re-deriving a pipe offset from a short write's byte count,
/// since that count is in *transformed* space and doesn't correspond to any
/// prefix length of the untransformed bytes still sitting in the pipe.
struct Pending {
    remaining: Vec<u8>,
    original_len: usize,
}

thread_local! {
    // The loop runs on a single thread and is the sole mutator of every
    // in-core data structure, so a plain `RefCell` side table keyed by
    // connection is all this needs.
    static PENDING: RefCell<HashMap<ConnectionHandle, Pending>> = RefCell::new(HashMap::new());
}

fn main() -> io::Result<()> {
    xps_core::logging::init();
    xps_core::signal::install()?;

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9001);
    let mut core = Core::new()?;
    core.bind_with_sink_handler(addr, reversing_sink_handler)?;
    core.run()
}

/// Reverses `data` excluding a single trailing `\n`: `"hello\n" ->
/// "olleh\n"`.
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

/// Installed in place of the crate's built-in sink handler. While a reversed
/// chunk is only partially sent, the pipe is left un-discarded (so it stays
/// readable and the pipe progress pass keeps invoking this handler on every
/// subsequent `EPOLLOUT`); only once the whole chunk is flushed does the
/// original bytes get dropped from the pipe and a fresh chunk get pulled.
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
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                core.mark_sink_not_ready(handle);
            }
            Err(_) => {
                // A terminal socket error here also surfaces to the loop as
                // EPOLLERR/EPOLLHUP independently of this handler, which
                // drives the connection's normal consolidated close; nothing
                // further to do but stop holding onto this chunk.
                pending.remove(&handle);
            }
        }
    });
}
