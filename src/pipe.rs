//! The pipe runtime: bounded, back-pressured single-producer/single-
//! consumer byte queues.
//!
//! # Ownership
//!
//! Core owns every `Pipe`; a `Pipe` holds *non-owning* references to its
//! source/sink; each endpoint holds a non-owning reference back to its
//! pipe. Both directions are `Option<PipeHandle>` / `Option<ConnectionHandle>`
//! — a generational [`crate::slab::Handle`] is exactly a non-owning,
//! safely-dangling-detectable reference, so there is no cycle to break with
//! `Rc`/`Weak`: `Core::connections` and `Core::pipes` are the sole owners,
//! everything else is a handle into one of them.
//!
//! `handler`/`close` are plain `fn(&mut Core, ConnectionHandle)` pointers —
//! see `DESIGN.md` for why a tagged owner + fn pointer replaces an
//! opaque-pointer callback without losing the ability to plug in a
//! different handler body (the `reverse_echo` demo overrides just the sink
//! handler this way).

use crate::buffer::{Buffer, BufferList};
use crate::connection::ConnectionHandle;
use crate::core::Core;
use crate::error::CoreError;

pub(crate) type HandlerFn = fn(&mut Core, ConnectionHandle);

/// One half of a [`Pipe`]: a writer ("source") or reader ("sink") endpoint.
/// Structurally identical in both roles — which half it plays is simply
/// which field of `Pipe` (or `Connection`) holds it.
pub(crate) struct PipeEndpoint {
    pub(crate) ready: bool,
    pub(crate) active: bool,
    pub(crate) pipe: Option<PipeHandle>,
    pub(crate) owner: ConnectionHandle,
    pub(crate) handler: HandlerFn,
    pub(crate) close: HandlerFn,
}

impl PipeEndpoint {
    pub(crate) fn new(owner: ConnectionHandle, handler: HandlerFn, close: HandlerFn) -> PipeEndpoint {
        PipeEndpoint { ready: false, active: false, pipe: None, owner, handler, close }
    }
}

pub(crate) type PipeHandle = crate::slab::Handle;

/// A bounded queue of buffers linking one source endpoint to one sink
/// endpoint. Readable iff `len() > 0`; writable iff `len() < buff_thresh`.
pub(crate) struct Pipe {
    buff_list: BufferList,
    buff_thresh: usize,
    source: Option<ConnectionHandle>,
    sink: Option<ConnectionHandle>,
}

impl Pipe {
    pub(crate) fn new(buff_thresh: usize) -> Pipe {
        assert!(buff_thresh > 0);
        Pipe { buff_list: BufferList::new(), buff_thresh, source: None, sink: None }
    }

    pub(crate) fn len(&self) -> usize {
        self.buff_list.len()
    }

    pub(crate) fn is_readable(&self) -> bool {
        self.buff_list.len() > 0
    }

    pub(crate) fn is_writable(&self) -> bool {
        self.buff_list.len() < self.buff_thresh
    }

    /// How many more bytes a single `source_write` may append right now
    /// without crossing `buff_thresh` — `0` when not writable. A source
    /// handler sizes its `recv()` scratch buffer against this so a single
    /// whole-buffer write never trips the boundary in `source_write` below
    /// during ordinary operation.
    pub(crate) fn remaining_capacity(&self) -> usize {
        self.buff_thresh.saturating_sub(self.buff_list.len())
    }

    pub(crate) fn source(&self) -> Option<ConnectionHandle> {
        self.source
    }

    pub(crate) fn sink(&self) -> Option<ConnectionHandle> {
        self.sink
    }

    pub(crate) fn has_no_endpoints(&self) -> bool {
        self.source.is_none() && self.sink.is_none()
    }

    /// Fails if a source is already attached.
    pub(crate) fn attach_source(&mut self, owner: ConnectionHandle) -> Result<(), CoreError> {
        if self.source.is_some() {
            return Err(CoreError::EndpointAlreadyAttached);
        }
        self.source = Some(owner);
        Ok(())
    }

    pub(crate) fn attach_sink(&mut self, owner: ConnectionHandle) -> Result<(), CoreError> {
        if self.sink.is_some() {
            return Err(CoreError::EndpointAlreadyAttached);
        }
        self.sink = Some(owner);
        Ok(())
    }

    pub(crate) fn detach_source(&mut self) -> Result<(), CoreError> {
        if self.source.take().is_none() {
            return Err(CoreError::EndpointDetached);
        }
        Ok(())
    }

    pub(crate) fn detach_sink(&mut self) -> Result<(), CoreError> {
        if self.sink.take().is_none() {
            return Err(CoreError::EndpointDetached);
        }
        Ok(())
    }

    /// Appends a **duplicated** buffer, failing if the pipe is not
    /// currently writable, or if this buffer's length would push `len()`
    /// past `buff_thresh`. Writes are whole-buffer: a buffer that would
    /// cross `buff_thresh` is rejected outright rather than split, even
    /// when `len() == buff_thresh - 1` and the buffer itself would fit
    /// except for the overshoot — no partial append.
    pub(crate) fn source_write(&mut self, buffer: &Buffer) -> Result<(), CoreError> {
        if !self.is_writable() {
            return Err(CoreError::PipeNotWritable);
        }
        if self.buff_list.len() + buffer.len() > self.buff_thresh {
            return Err(CoreError::PipeNotWritable);
        }
        self.buff_list.append(buffer.duplicate());
        Ok(())
    }

    /// Assembles the first `n` bytes without mutating the pipe. `n == 0`
    /// is rejected.
    pub(crate) fn sink_read(&self, n: usize) -> Result<Buffer, CoreError> {
        if n == 0 {
            return Err(CoreError::InvalidLength);
        }
        self.buff_list.read(n).ok_or(CoreError::Overread)
    }

    /// Drops the first `n` bytes. `n == 0` is rejected, matching `sink_read`.
    pub(crate) fn sink_drop(&mut self, n: usize) -> Result<(), CoreError> {
        if n == 0 {
            return Err(CoreError::InvalidLength);
        }
        self.buff_list.drop_front(n).ok_or(CoreError::Overread)
    }
}

/// Allocates a pipe in `core`'s collection, attaches `source_owner`'s
/// source endpoint and `sink_owner`'s sink endpoint to it, and marks both
/// endpoints active. `source_owner == sink_owner` gives the self-looped
/// echo wiring used for the loopback configuration; distinct owners give
/// one leg of a two-pipes-per-pairing proxy.
pub(crate) fn create(core: &mut Core, buff_thresh: usize, source_owner: ConnectionHandle, sink_owner: ConnectionHandle) -> PipeHandle {
    let handle = core.pipes_mut().insert(Pipe::new(buff_thresh));

    let pipe = core.pipes_mut().get_mut(handle).expect("just inserted");
    pipe.attach_source(source_owner).expect("freshly created pipe has no source yet");
    pipe.attach_sink(sink_owner).expect("freshly created pipe has no sink yet");

    if let Some(conn) = core.connections_mut().get_mut(source_owner) {
        conn.source.pipe = Some(handle);
        conn.source.active = true;
    }
    if let Some(conn) = core.connections_mut().get_mut(sink_owner) {
        conn.sink.pipe = Some(handle);
        conn.sink.active = true;
    }

    handle
}

pub(crate) fn create_looped(core: &mut Core, conn: ConnectionHandle, buff_thresh: usize) -> PipeHandle {
    create(core, buff_thresh, conn, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writable_boundary_is_strict_less_than() {
        let mut pipe = Pipe::new(4);
        assert!(pipe.source_write(&Buffer::create(4, Some(b"abcd"))).is_ok());
        // len == buff_thresh now: not writable, even for a zero-length write.
        assert!(!pipe.is_writable());
        assert!(matches!(pipe.source_write(&Buffer::create(0, None)), Err(CoreError::PipeNotWritable)));
    }

    #[test]
    fn writable_boundary_rejects_crossing_write_wholesale() {
        let mut pipe = Pipe::new(4);
        assert!(pipe.source_write(&Buffer::create(3, Some(b"abc"))).is_ok());
        // len == 3 == thresh - 1 (still writable), but this buffer would
        // push len to 5 > 4. No partial/split append, so the whole write
        // fails rather than taking the first byte.
        assert!(pipe.is_writable());
        assert!(matches!(pipe.source_write(&Buffer::create(2, Some(b"de"))), Err(CoreError::PipeNotWritable)));
        assert_eq!(pipe.len(), 3);

        // A buffer that lands exactly on the threshold is accepted.
        assert!(pipe.source_write(&Buffer::create(1, Some(b"d"))).is_ok());
        assert_eq!(pipe.len(), 4);
    }

    #[test]
    fn sink_read_and_drop_reject_zero_length() {
        let mut pipe = Pipe::new(16);
        pipe.source_write(&Buffer::create(3, Some(b"abc"))).unwrap();
        assert!(matches!(pipe.sink_read(0), Err(CoreError::InvalidLength)));
        assert!(matches!(pipe.sink_drop(0), Err(CoreError::InvalidLength)));
    }

    #[test]
    fn sink_read_overrun_fails_without_mutation() {
        let mut pipe = Pipe::new(16);
        pipe.source_write(&Buffer::create(3, Some(b"abc"))).unwrap();
        assert!(matches!(pipe.sink_read(4), Err(CoreError::Overread)));
        assert_eq!(pipe.len(), 3);
    }

    #[test]
    fn attach_detach_roundtrip() {
        let mut pipe = Pipe::new(16);
        let owner = crate::slab::Handle::dangling();
        pipe.attach_source(owner).unwrap();
        assert!(matches!(pipe.attach_source(owner), Err(CoreError::EndpointAlreadyAttached)));
        pipe.detach_source().unwrap();
        assert!(matches!(pipe.detach_source(), Err(CoreError::EndpointDetached)));
    }
}
