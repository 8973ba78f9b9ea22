// Shared helpers for the integration tests in this directory.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::thread;

use xps_core::Core;

/// `"127.0.0.1:0"`: ask the kernel to pick a free port.
pub fn local_loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Drives `core` forever on a dedicated background thread.
///
/// `Core::run()` only returns after a SIGINT-style shutdown request, which
/// these tests never issue (and which is a single process-wide flag not
/// worth sharing across unrelated tests); `tick()` is the lower-level
/// primitive `run()` itself is built from (see `core.rs`'s doc comment on
/// why it's exposed), so tests drive it directly instead. The thread is
/// never joined — `tick()` only ever blocks inside `epoll_wait`, so a
/// leaked thread here just sits idle until the test binary's process exits.
pub fn spawn_core(mut core: Core) {
    thread::spawn(move || loop {
        core.tick();
    });
}
