//! Outbound connection dialing: a non-blocking `connect()` wired into a
//! `Connection` with no owning `Listener`.

use std::net::SocketAddr;

use crate::connection::ConnectionHandle;
use crate::core::Core;
use crate::sys::Socket;

/// Dials `addr` non-blocking (tolerating `EINPROGRESS`) and wraps the
/// socket in a `Connection` exactly like an accepted one, but with
/// `listener = None`. Completion of the connect is reported the normal
/// way, via the fd becoming write-ready.
pub fn connect(core: &mut Core, addr: SocketAddr) -> std::io::Result<ConnectionHandle> {
    let socket = Socket::stream(&addr)?;
    socket.connect(&addr)?;
    crate::connection::create(core, socket, addr, None)
}
