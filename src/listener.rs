//! `Listener`: owns a non-blocking, edge-triggered listening socket and
//! accepts connections until `EAGAIN`.
//!
//! Listener/accept bootstrap sits outside the core event-loop proper: this
//! module is a concrete consumer of it, depending only on
//! `Core`/`Connection`/`Pipe`'s already-specified public surface.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use log::{error, info};

use crate::config::{DEFAULT_BACKLOG, DEFAULT_PIPE_BUFF_THRESH};
use crate::core::{Core, LoopOwner};
use crate::interest::Interest;
use crate::sys::Socket;

pub type ListenerHandle = crate::slab::Handle;

/// How `accept_handler` wires each newly-accepted connection's pipes.
/// `Copy` because it's read out of the `Listener` slot once per accept
/// loop, before any connection/pipe mutation starts.
#[derive(Clone, Copy)]
enum Pairing {
    /// The accepted connection's own source feeds its own sink, yielding
    /// a reversible echo. `sink_override` optionally swaps in a different
    /// sink handler (e.g. line reversal) on top of that self-looped
    /// wiring.
    Loopback { sink_override: Option<crate::ConnectionHandler> },
    /// The accepted connection's source is paired with an upstream
    /// connection's sink and vice versa — two pipes per client<->upstream
    /// pairing. `upstream_addr` is dialed fresh for every accepted client.
    Proxy { upstream_addr: SocketAddr },
}

pub(crate) struct Listener {
    socket: Socket,
    pub(crate) addr: SocketAddr,
    pairing: Pairing,
}

impl Listener {
    fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// The address argument is what a caller asked to bind, not necessarily
/// what got bound — binding port `0` asks the kernel to pick one. Every
/// `create_*` variant re-resolves via `getsockname` after `listen()`
/// succeeds so `Core::listener_addr` reports the real port.
///
/// Binds, sets `SO_REUSEADDR`, listens with `DEFAULT_BACKLOG`, and
/// registers for `READABLE` only — a listening socket never gets a write
/// or close handler.
pub(crate) fn create(core: &mut Core, addr: SocketAddr) -> std::io::Result<ListenerHandle> {
    create_loopback(core, addr, None)
}

pub(crate) fn create_loopback(
    core: &mut Core,
    addr: SocketAddr,
    sink_override: Option<crate::ConnectionHandler>,
) -> std::io::Result<ListenerHandle> {
    bind_and_register(core, addr, Pairing::Loopback { sink_override })
}

pub(crate) fn create_proxy(core: &mut Core, addr: SocketAddr, upstream_addr: SocketAddr) -> std::io::Result<ListenerHandle> {
    bind_and_register(core, addr, Pairing::Proxy { upstream_addr })
}

fn bind_and_register(core: &mut Core, addr: SocketAddr, pairing: Pairing) -> std::io::Result<ListenerHandle> {
    let socket = Socket::stream(&addr)?;
    socket.set_reuse_address()?;
    socket.bind(&addr)?;
    socket.listen(DEFAULT_BACKLOG)?;
    let addr = socket.local_addr().unwrap_or(addr);

    let fd = socket.as_raw_fd();
    let handle = core.listeners_mut().insert(Listener { socket, addr, pairing });

    match core.event_loop_mut().attach(fd, Interest::READABLE, LoopOwner::Listener(handle), Some(accept_handler), None, None) {
        Ok(_) => {
            info!("listener::create(): listening on {}", addr);
            Ok(handle)
        }
        Err(err) => {
            error!("listener::create(): loop attach failed: {}", err);
            core.listeners_mut().remove(handle);
            Err(err)
        }
    }
}

pub(crate) fn destroy(core: &mut Core, handle: ListenerHandle) {
    let Some(listener) = core.listeners().get(handle) else {
        return;
    };
    let fd = listener.fd();
    if let Err(err) = core.event_loop_mut().detach(fd) {
        error!("listener::destroy(): loop detach failed: {}", err);
    }
    core.listeners_mut().remove(handle);
}

/// Accepts in a loop until `EAGAIN`. Each accepted socket becomes a
/// `Connection`, then wired per the listener's [`Pairing`]: self-looped
/// for the echo/loopback configuration, or paired with a freshly-dialed
/// upstream connection for the proxy configuration.
fn accept_handler(core: &mut Core, owner: LoopOwner) {
    let LoopOwner::Listener(handle) = owner else { return };

    loop {
        let Some(listener) = core.listeners().get(handle) else { return };
        let pairing = listener.pairing;
        let accepted = listener.socket.accept();

        let (client_socket, remote_addr) = match accepted {
            Ok(Some(pair)) => pair,
            Ok(None) => break,
            Err(err) => {
                error!("listener::accept_handler(): accept() failed: {}", err);
                return;
            }
        };

        let conn_handle = match crate::connection::create(core, client_socket, remote_addr, Some(handle)) {
            Ok(conn_handle) => conn_handle,
            Err(err) => {
                error!("listener::accept_handler(): connection::create() failed: {}", err);
                continue;
            }
        };

        match pairing {
            Pairing::Loopback { sink_override } => {
                crate::pipe::create_looped(core, conn_handle, DEFAULT_PIPE_BUFF_THRESH);
                if let Some(handler) = sink_override {
                    crate::connection::set_sink_handler(core, conn_handle, handler);
                }
                info!("listener::accept_handler(): new connection from {}", remote_addr);
            }
            Pairing::Proxy { upstream_addr } => match crate::upstream::connect(core, upstream_addr) {
                Ok(upstream_handle) => {
                    core.pair(conn_handle, upstream_handle);
                    info!("listener::accept_handler(): proxying {} to {}", remote_addr, upstream_addr);
                }
                Err(err) => {
                    error!("listener::accept_handler(): upstream dial to {} failed: {}", upstream_addr, err);
                    // No pipe was ever attached to this connection's endpoints,
                    // so the progress pass's "has no endpoints" reclamation
                    // never applies to it (it never has a pipe at all) —
                    // close it outright rather than leaving it registered
                    // with the loop forever.
                    crate::connection::close(core, conn_handle, false);
                }
            },
        }
    }
}
