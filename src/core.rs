//! `Core`: the process-wide registry of listeners, connections, and pipes,
//! and the tick driver that ties the event loop to the pipe runtime.
//!
//! The tick algorithm lives here, as methods on `Core`, rather than on
//! `EventLoop`, because it needs simultaneous access to the loop's
//! registrations *and* the listeners/connections/pipes collections. See
//! `event_loop.rs`'s module doc comment and `DESIGN.md` for the full
//! rationale.

use std::net::SocketAddr;
use std::time::Duration;

use log::{error, info};

use crate::config::DEFAULT_NULLS_THRESH;
use crate::connection::ConnectionHandle;
use crate::event_loop::{EventLoop, ReadyEvent};
use crate::listener::ListenerHandle;
use crate::pipe::{Pipe, PipeHandle};
use crate::slab::Slab;

/// The tagged owner a `registry::EventRecord` carries. The pipe runtime's
/// own per-endpoint owner (`PipeEndpoint::owner`) is a plain
/// `ConnectionHandle` instead, since only a `Connection` ever owns a pipe
/// endpoint — only the event loop's registrations need to distinguish a
/// `Listener` from a `Connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopOwner {
    Listener(ListenerHandle),
    Connection(ConnectionHandle),
}

pub struct Core {
    event_loop: EventLoop,
    listeners: Slab<crate::listener::Listener>,
    connections: Slab<crate::connection::Connection>,
    pipes: Slab<Pipe>,
}

impl Core {
    pub fn new() -> std::io::Result<Core> {
        Ok(Core {
            event_loop: EventLoop::new()?,
            listeners: Slab::new(),
            connections: Slab::new(),
            pipes: Slab::new(),
        })
    }

    pub(crate) fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    pub(crate) fn listeners(&self) -> &Slab<crate::listener::Listener> {
        &self.listeners
    }

    pub(crate) fn listeners_mut(&mut self) -> &mut Slab<crate::listener::Listener> {
        &mut self.listeners
    }

    pub(crate) fn connections(&self) -> &Slab<crate::connection::Connection> {
        &self.connections
    }

    pub(crate) fn connections_mut(&mut self) -> &mut Slab<crate::connection::Connection> {
        &mut self.connections
    }

    pub(crate) fn pipes(&self) -> &Slab<Pipe> {
        &self.pipes
    }

    pub(crate) fn pipes_mut(&mut self) -> &mut Slab<Pipe> {
        &mut self.pipes
    }

    /// Binds and registers a new listener, returning its handle.
    pub fn bind(&mut self, addr: SocketAddr) -> std::io::Result<ListenerHandle> {
        crate::listener::create(self, addr)
    }

    /// Like [`bind`](Core::bind), but every connection this listener
    /// accepts has its sink handler replaced with `sink_handler` — the
    /// seam `demos/reverse_echo.rs` uses to layer line reversal on top of
    /// the otherwise verbatim byte-mover core.
    pub fn bind_with_sink_handler(&mut self, addr: SocketAddr, sink_handler: crate::ConnectionHandler) -> std::io::Result<ListenerHandle> {
        crate::listener::create_loopback(self, addr, Some(sink_handler))
    }

    /// Binds a listener in the **proxy configuration**: every accepted
    /// connection is paired, via [`Core::pair`], with a fresh outbound
    /// connection to `upstream_addr` instead of being self-looped into an
    /// echo — two pipes per client<->upstream pairing, one per direction.
    /// If the upstream dial fails, the just-accepted client connection is
    /// closed immediately rather than left dangling with no pipes at all.
    pub fn bind_proxy(&mut self, addr: SocketAddr, upstream_addr: SocketAddr) -> std::io::Result<ListenerHandle> {
        crate::listener::create_proxy(self, addr, upstream_addr)
    }

    /// Wires two already-created connections into a full-duplex pairing:
    /// `a`'s inbound bytes flow to `b`, and `b`'s inbound bytes flow to
    /// `a`, each direction its own `DEFAULT_PIPE_BUFF_THRESH`-bounded pipe.
    /// Call it with an accepted connection and one dialed via
    /// [`crate::upstream::connect`] to build a reverse proxy.
    /// [`Core::bind_proxy`] uses this internally for the common case of a
    /// single fixed upstream address.
    pub fn pair(&mut self, a: ConnectionHandle, b: ConnectionHandle) {
        crate::pipe::create(self, crate::config::DEFAULT_PIPE_BUFF_THRESH, a, b);
        crate::pipe::create(self, crate::config::DEFAULT_PIPE_BUFF_THRESH, b, a);
    }

    /// The address actually bound for a listener created via [`Core::bind`]
    /// or [`Core::bind_with_sink_handler`] — resolved via `getsockname`, so
    /// binding port `0` reports back whichever port the kernel picked.
    pub fn listener_addr(&self, handle: ListenerHandle) -> Option<SocketAddr> {
        self.listeners.get(handle).map(|l| l.addr)
    }

    /// Bytes currently buffered in `conn`'s sink-side pipe, or `None` if
    /// `conn` no longer names a live connection or its sink is detached.
    ///
    /// Part of the seam an embedder's own sink handler uses in place of the
    /// crate's verbatim byte-mover one (see [`set_sink_handler`] and
    /// `demos/reverse_echo.rs`): reading and sending are split from
    /// draining, so an embedder can inspect or transform buffered bytes
    /// before deciding how much of the pipe to discard.
    ///
    /// [`set_sink_handler`]: crate::set_sink_handler
    pub fn sink_buffered_len(&self, conn: ConnectionHandle) -> Option<usize> {
        let pipe_handle = self.connections.get(conn)?.sink.pipe?;
        self.pipes.get(pipe_handle).map(Pipe::len)
    }

    /// Assembles the first `n` buffered bytes of `conn`'s sink-side pipe
    /// without draining it, exposed for a custom sink handler. `None` if
    /// `conn`'s sink is detached or `n` exceeds the buffered length.
    pub fn sink_peek(&self, conn: ConnectionHandle, n: usize) -> Option<Vec<u8>> {
        let pipe_handle = self.connections.get(conn)?.sink.pipe?;
        self.pipes.get(pipe_handle)?.sink_read(n).ok().map(|b| b.as_slice().to_vec())
    }

    /// Discards the first `n` buffered bytes of `conn`'s sink-side pipe,
    /// exposed for a custom sink handler.
    pub fn sink_discard(&mut self, conn: ConnectionHandle, n: usize) -> Result<(), crate::error::CoreError> {
        let pipe_handle = self.connections.get(conn).and_then(|c| c.sink.pipe).ok_or(crate::error::CoreError::EndpointDetached)?;
        self.pipes.get_mut(pipe_handle).ok_or(crate::error::CoreError::EndpointDetached)?.sink_drop(n)
    }

    /// Sends `data` directly on `conn`'s socket, bypassing the pipe. A
    /// custom sink handler installed via [`set_sink_handler`] uses this in
    /// place of the crate's own `send()` call so it can transform bytes
    /// first; the handler is responsible for clearing `sink.ready` on
    /// would-block and for its own short-write bookkeeping, exactly as the
    /// built-in sink handler does.
    ///
    /// [`set_sink_handler`]: crate::set_sink_handler
    pub fn send_to_connection(&self, conn: ConnectionHandle, data: &[u8]) -> std::io::Result<usize> {
        match self.connections.get(conn) {
            Some(conn) => conn.send(data),
            None => Err(std::io::ErrorKind::NotFound.into()),
        }
    }

    /// Clears `conn`'s sink readiness flag — what a custom sink handler
    /// calls on `EAGAIN`/`EWOULDBLOCK` in place of the built-in handler's
    /// own bookkeeping, so the pipe progress pass stops invoking it until
    /// the next `EPOLLOUT` edge.
    pub fn mark_sink_not_ready(&mut self, conn: ConnectionHandle) {
        if let Some(conn) = self.connections.get_mut(conn) {
            conn.sink.ready = false;
        }
    }

    /// Binds every address in turn, then enters `run()`.
    pub fn start(&mut self, addrs: &[SocketAddr]) -> std::io::Result<()> {
        for &addr in addrs {
            self.bind(addr)?;
        }
        self.run()
    }

    /// Ticks until a SIGINT-style shutdown request lands, then runs
    /// `destroy()` and returns.
    pub fn run(&mut self) -> std::io::Result<()> {
        info!("core::run(): entering event loop");
        while !crate::signal::shutdown_requested() {
            self.tick();
        }
        self.destroy();
        Ok(())
    }

    /// One iteration of the tick algorithm: the pipe progress pass, the
    /// kernel wait, event dispatch, then compaction.
    ///
    /// `run()` is just `while !shutdown_requested() { self.tick() }` — this
    /// exposes the single-tick primitive the run loop is built from, for
    /// embedders that want their own driving loop, and for integration
    /// tests that need to step the loop under a test-controlled condition
    /// instead of blocking on SIGINT.
    pub fn tick(&mut self) {
        let has_work = self.progress_pipes();

        let timeout = if has_work { Some(Duration::ZERO) } else { None };
        if let Err(err) = self.event_loop.poll(timeout) {
            // A negative return from the kernel wait is logged and
            // ignored, treated as spurious.
            error!("core::tick(): kernel wait failed: {}", err);
        }

        if self.event_loop.has_events() {
            self.dispatch_events();
        }

        self.compact_if_needed();
    }

    /// The mutation sweep over every pipe slot, followed by a read-only
    /// `has_work` sweep.
    fn progress_pipes(&mut self) -> bool {
        for handle in self.pipes.handles() {
            self.progress_pipe(handle);
        }

        self.pipes.handles().iter().any(|&handle| self.pipe_has_work(handle))
    }

    fn progress_pipe(&mut self, handle: PipeHandle) {
        let Some(pipe) = self.pipes.get(handle) else { return };
        if pipe.has_no_endpoints() {
            self.pipes.remove(handle);
            return;
        }

        // Step 2: source ready & pipe writable -> pull from the source.
        let source = self.pipes.get(handle).and_then(Pipe::source);
        if let Some(src_owner) = source {
            let should_call =
                self.connections.get(src_owner).is_some_and(|c| c.source.ready) && self.pipes.get(handle).is_some_and(Pipe::is_writable);
            if should_call {
                let handler = self.connections.get(src_owner).expect("checked above").source.handler;
                handler(self, src_owner);
            }
        }

        // Step 3: sink ready & pipe readable -> push to the sink. Readable
        // is re-checked here rather than reusing step 2's snapshot, since
        // step 2 may just have appended to the pipe.
        let sink = self.pipes.get(handle).and_then(Pipe::sink);
        if let Some(sink_owner) = sink {
            let should_call =
                self.connections.get(sink_owner).is_some_and(|c| c.sink.ready) && self.pipes.get(handle).is_some_and(Pipe::is_readable);
            if should_call {
                let handler = self.connections.get(sink_owner).expect("checked above").sink.handler;
                handler(self, sink_owner);
            }
        }

        // Steps 4 & 5 re-read source/sink presence once more: either side
        // may have detached itself while handling steps 2/3 above.
        let source = self.pipes.get(handle).and_then(Pipe::source);
        let sink = self.pipes.get(handle).and_then(Pipe::sink);

        if source.is_some() && sink.is_none() {
            let owner = source.expect("checked above");
            let close_cb = self.connections.get_mut(owner).map(|conn| {
                conn.source.active = false;
                conn.source.close
            });
            if let Some(close_cb) = close_cb {
                close_cb(self, owner);
            }
        } else if sink.is_some() && source.is_none() {
            let owner = sink.expect("checked above");
            let empty = !self.pipes.get(handle).is_some_and(Pipe::is_readable);
            if empty {
                let close_cb = self.connections.get_mut(owner).map(|conn| {
                    conn.sink.active = false;
                    conn.sink.close
                });
                if let Some(close_cb) = close_cb {
                    close_cb(self, owner);
                }
            }
        }
    }

    /// The read-only half of the progress pass: would any of the four
    /// mutating predicates fire for this pipe right now.
    fn pipe_has_work(&self, handle: PipeHandle) -> bool {
        let Some(pipe) = self.pipes.get(handle) else { return false };
        let source = pipe.source();
        let sink = pipe.sink();

        let source_can_progress =
            source.is_some_and(|owner| self.connections.get(owner).is_some_and(|c| c.source.ready) && pipe.is_writable());
        let sink_can_progress = sink.is_some_and(|owner| self.connections.get(owner).is_some_and(|c| c.sink.ready) && pipe.is_readable());
        let source_terminal = source.is_some() && sink.is_none();
        let sink_terminal = sink.is_some() && source.is_none() && !pipe.is_readable();

        source_can_progress || sink_can_progress || source_terminal || sink_terminal
    }

    /// Resolves each ready event back to a record, dispatching close, then
    /// read, then write, re-fetching the record between each phase so a
    /// callback that detaches this fd stops later phases from firing.
    fn dispatch_events(&mut self) {
        let ready: Vec<ReadyEvent> = self.event_loop.ready_events();
        for event in ready {
            self.dispatch_one(event);
        }
    }

    fn dispatch_one(&mut self, event: ReadyEvent) {
        if event.is_close {
            self.dispatch_phase(event.token, |record| record.close_cb);
        }
        if event.is_read {
            self.dispatch_phase(event.token, |record| record.read_cb);
        }
        if event.is_write {
            self.dispatch_phase(event.token, |record| record.write_cb);
        }
    }

    fn dispatch_phase(&mut self, token: crate::token::Token, pick: fn(&crate::registry::EventRecord) -> Option<fn(&mut Core, LoopOwner)>) {
        let resolved = self.event_loop.record(token).and_then(|record| pick(record).map(|cb| (cb, record.owner)));
        if let Some((cb, owner)) = resolved {
            cb(self, owner);
        }
    }

    /// Reclaims tombstoned slots, run once per tick, per collection.
    fn compact_if_needed(&mut self) {
        if self.listeners.null_count() > DEFAULT_NULLS_THRESH {
            self.listeners.compact();
        }
        if self.connections.null_count() > DEFAULT_NULLS_THRESH {
            self.connections.compact();
        }
        if self.pipes.null_count() > DEFAULT_NULLS_THRESH {
            self.pipes.compact();
        }
        if self.event_loop.null_count() > DEFAULT_NULLS_THRESH {
            self.event_loop.compact();
        }
    }

    /// Tears down connections, then listeners, then pipes, in that order,
    /// before the loop itself is dropped along with `Core`.
    pub fn destroy(&mut self) {
        info!("core::destroy(): shutting down");
        for handle in self.connections.handles() {
            crate::connection::close(self, handle, false);
        }
        for handle in self.listeners.handles() {
            crate::listener::destroy(self, handle);
        }
        for handle in self.pipes.handles() {
            self.pipes.remove(handle);
        }
    }
}
