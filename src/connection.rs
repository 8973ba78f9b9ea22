//! `Connection`: binds one non-blocking socket to a source/sink endpoint
//! pair, with the four socket handlers and the consolidated close policy
//! that drive it.
//!
//! The core stays a verbatim byte mover: nothing in this module inspects
//! or transforms the bytes moving through a pipe (`demos/reverse_echo.rs`
//! layers its line-reversal on top by swapping out just the sink
//! endpoint's `handler` fn pointer after construction — see `DESIGN.md`).

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use log::{debug, error, info};

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::core::{Core, LoopOwner};
use crate::interest::Interest;
use crate::pipe::{Pipe, PipeEndpoint};
use crate::sys::Socket;

pub type ConnectionHandle = crate::slab::Handle;
pub(crate) use crate::listener::ListenerHandle;

pub(crate) struct Connection {
    socket: Socket,
    pub(crate) listener: Option<ListenerHandle>,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) source: PipeEndpoint,
    pub(crate) sink: PipeEndpoint,
}

impl Connection {
    pub(crate) fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    /// Raw, unmediated `send()` on this connection's socket — the primitive
    /// [`Core::send_to_connection`] exposes for an embedder's own sink
    /// handler (see `demos/reverse_echo.rs`). Bypasses the pipe entirely;
    /// callers are responsible for their own back-pressure bookkeeping.
    pub(crate) fn send(&self, data: &[u8]) -> std::io::Result<usize> {
        self.socket.send(data)
    }
}

/// Wires up source/sink endpoints, attaches the socket to the loop for
/// `read | write | close`, and stores the connection. On any failure
/// after the socket is owned, the socket is closed and nothing is left
/// registered.
pub(crate) fn create(
    core: &mut Core,
    socket: Socket,
    remote_addr: SocketAddr,
    listener: Option<ListenerHandle>,
) -> std::io::Result<ConnectionHandle> {
    let fd = socket.as_raw_fd();

    let handle = core.connections_mut().insert_with(|handle| Connection {
        socket,
        listener,
        remote_addr,
        source: PipeEndpoint::new(handle, source_handler, source_close_handler),
        sink: PipeEndpoint::new(handle, sink_handler, sink_close_handler),
    });

    let attach_result = core.event_loop_mut().attach(
        fd,
        Interest::READABLE | Interest::WRITABLE,
        LoopOwner::Connection(handle),
        Some(loop_read_handler),
        Some(loop_write_handler),
        Some(loop_close_handler),
    );

    match attach_result {
        Ok(_) => {
            debug!("connection::create(): created connection for fd {}", fd);
            Ok(handle)
        }
        Err(err) => {
            error!("connection::create(): loop attach failed: {}", err);
            core.connections_mut().remove(handle);
            Err(err)
        }
    }
}

/// The consolidated close path: detaches the fd from the loop, closes the
/// socket (by dropping it), detaches both endpoints from whatever pipe
/// they're attached to, and tombstones the connection slot. The pipe
/// itself is left alone — it persists until both its endpoints are gone,
/// which is what lets the other side of a proxy keep draining after this
/// side closes.
pub(crate) fn close(core: &mut Core, handle: ConnectionHandle, peer_closed: bool) {
    let Some(conn) = core.connections().get(handle) else {
        return;
    };
    let fd = conn.fd();
    info!("connection::close(): {}", if peer_closed { "peer closed connection" } else { "closing connection" });

    if let Err(err) = core.event_loop_mut().detach(fd) {
        error!("connection::close(): loop detach failed: {}", err);
    }

    if let Some(conn) = core.connections_mut().remove(handle) {
        if let Some(pipe_handle) = conn.source.pipe {
            if let Some(pipe) = core.pipes_mut().get_mut(pipe_handle) {
                let _ = pipe.detach_source();
            }
        }
        if let Some(pipe_handle) = conn.sink.pipe {
            if let Some(pipe) = core.pipes_mut().get_mut(pipe_handle) {
                let _ = pipe.detach_sink();
            }
        }
        // `conn.socket` (and so the fd) closes here, on drop.
    }
}

/// Replaces `handle`'s sink handler with a different `fn` pointer, leaving
/// the rest of the connection (including its close callback) untouched.
/// This is the one seam the core exposes for layering application logic
/// (e.g. `demos/reverse_echo.rs`'s line reversal) on top of the otherwise
/// verbatim byte-mover core without it ever inspecting or transforming
/// bytes itself. A no-op if `handle` no longer names a live connection.
pub fn set_sink_handler(core: &mut Core, handle: ConnectionHandle, handler: crate::ConnectionHandler) {
    if let Some(conn) = core.connections_mut().get_mut(handle) {
        conn.sink.handler = handler;
    }
}

fn loop_read_handler(core: &mut Core, owner: LoopOwner) {
    let LoopOwner::Connection(handle) = owner else { return };
    if let Some(conn) = core.connections_mut().get_mut(handle) {
        conn.source.ready = true;
    }
}

fn loop_write_handler(core: &mut Core, owner: LoopOwner) {
    let LoopOwner::Connection(handle) = owner else { return };
    if let Some(conn) = core.connections_mut().get_mut(handle) {
        conn.sink.ready = true;
    }
}

/// EPOLLERR/EPOLLHUP handler. Always a peer-initiated close from the
/// loop's point of view.
fn loop_close_handler(core: &mut Core, owner: LoopOwner) {
    let LoopOwner::Connection(handle) = owner else { return };
    close(core, handle, true);
}

/// Called by the pipe runtime once per tick while the source is ready and
/// its pipe is writable. Reads once into a scratch buffer and classifies
/// the result.
///
/// The scratch buffer is sized to `min(DEFAULT_BUFFER_SIZE,
/// pipe.remaining_capacity())` rather than always the full
/// `DEFAULT_BUFFER_SIZE`: `source_write` rejects a whole buffer that would
/// cross `buff_thresh` as a strict invariant on `Pipe` itself (see
/// `pipe.rs`), so clamping the recv size here is what keeps that invariant
/// from turning an ordinary back-pressure stall into a spurious connection
/// close once the pipe is nearly full.
fn source_handler(core: &mut Core, handle: ConnectionHandle) {
    let Some(conn) = core.connections().get(handle) else { return };
    let pipe_handle = conn.source.pipe;
    let Some(pipe_handle) = pipe_handle else { return };
    let Some(remaining) = core.pipes().get(pipe_handle).map(Pipe::remaining_capacity) else { return };
    if remaining == 0 {
        return;
    }

    let Some(conn) = core.connections().get(handle) else { return };
    let mut buffer = crate::buffer::Buffer::create(DEFAULT_BUFFER_SIZE.min(remaining), None);

    let read_result = conn.socket.recv(buffer.scratch_mut());

    match read_result {
        Ok(0) => {
            // Peer EOF.
            close(core, handle, true);
        }
        Ok(n) => {
            buffer.set_len(n);
            let pipe_handle = core.connections().get(handle).and_then(|c| c.source.pipe);
            let Some(pipe_handle) = pipe_handle else { return };
            let write_result = core.pipes_mut().get_mut(pipe_handle).map(|p| p.source_write(&buffer));
            match write_result {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    error!("connection::source_handler(): source_write failed: {}", err);
                    close(core, handle, false);
                }
                None => {}
            }
        }
        Err(err) if would_block(&err) => {
            if let Some(conn) = core.connections_mut().get_mut(handle) {
                conn.source.ready = false;
            }
        }
        Err(err) => {
            error!("connection::source_handler(): recv() failed: {}", err);
            close(core, handle, false);
        }
    }
}

fn source_close_handler(core: &mut Core, handle: ConnectionHandle) {
    let Some(conn) = core.connections().get(handle) else { return };
    if !conn.source.active && !conn.sink.active {
        close(core, handle, false);
    }
}

/// Drains the pipe's full current length into the socket, then drops only
/// the prefix actually accepted by `send()` — the read-then-drop split
/// that makes a short write lossless on `EAGAIN`.
fn sink_handler(core: &mut Core, handle: ConnectionHandle) {
    let Some(conn) = core.connections().get(handle) else { return };
    let Some(pipe_handle) = conn.sink.pipe else { return };
    let Some(pipe_len) = core.pipes().get(pipe_handle).map(|p| p.len()) else { return };

    let Some(buffer) = core.pipes().get(pipe_handle).and_then(|p| p.sink_read(pipe_len).ok()) else {
        error!("connection::sink_handler(): sink_read() failed");
        return;
    };

    let Some(conn) = core.connections().get(handle) else { return };
    let write_result = conn.socket.send(buffer.as_slice());

    match write_result {
        Ok(0) => {}
        Ok(n) => {
            if let Some(pipe) = core.pipes_mut().get_mut(pipe_handle) {
                if let Err(err) = pipe.sink_drop(n) {
                    error!("connection::sink_handler(): failed to drop {} bytes: {}", n, err);
                }
            }
        }
        Err(err) if would_block(&err) => {
            if let Some(conn) = core.connections_mut().get_mut(handle) {
                conn.sink.ready = false;
            }
        }
        Err(err) => {
            error!("connection::sink_handler(): send() failed: {}", err);
            close(core, handle, false);
        }
    }
}

fn sink_close_handler(core: &mut Core, handle: ConnectionHandle) {
    let Some(conn) = core.connections().get(handle) else { return };
    if !conn.sink.active && !conn.source.active {
        close(core, handle, false);
    }
}

fn would_block(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK))
}
