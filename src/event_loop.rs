//! `EventLoop`: owns the kernel [`Selector`] and the [`Registry`] of
//! attached fds (`attach`/`detach`/`run` contract).
//!
//! The actual tick algorithm — pipe progress pass, kernel wait, dispatch,
//! compaction — lives as inherent methods on [`crate::core::Core`] in
//! `core.rs` rather than here: the driver needs to reach the
//! pipes/connections/listeners collections `Core` owns, and a safe Rust
//! `EventLoop` can't hold a `&mut Core` back into the struct that owns it.
//! So the driver is implemented where it already has that access for
//! free: as a method on `Core` that borrows its own `event_loop` field
//! and its collection fields independently. `EventLoop` itself stays
//! subordinate: attach, detach, and the raw kernel wait, nothing more. See
//! `DESIGN.md` for this adaptation.

use std::os::fd::RawFd;
use std::time::Duration;

use crate::core::LoopOwner;
use crate::error::CoreError;
use crate::interest::Interest;
use crate::registry::{EventRecord, Registry};
use crate::sys::{Events, Selector};
use crate::token::Token;

pub(crate) struct EventLoop {
    selector: Selector,
    registry: Registry,
    events: Events,
}

/// One fd's worth of callbacks, as resolved by the loop for a single
/// kernel-reported event: a close/read/write trio plus which of them the
/// kernel says actually fired.
pub(crate) struct ReadyEvent {
    pub(crate) token: Token,
    pub(crate) is_close: bool,
    pub(crate) is_read: bool,
    pub(crate) is_write: bool,
}

impl EventLoop {
    pub(crate) fn new() -> std::io::Result<EventLoop> {
        Ok(EventLoop {
            selector: Selector::new()?,
            registry: Registry::new(),
            events: Events::with_capacity(crate::config::MAX_EPOLL_EVENTS),
        })
    }

    /// Registers `fd` with the multiplexer, creates an `EventRecord`, and
    /// returns its `Token`. On failure (kernel registration), no record is
    /// retained.
    pub(crate) fn attach(
        &mut self,
        fd: RawFd,
        interests: Interest,
        owner: LoopOwner,
        read_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
        write_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
        close_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
    ) -> std::io::Result<Token> {
        let token = self.registry.insert(EventRecord { fd, owner, read_cb, write_cb, close_cb });
        match self.selector.register(fd, interests, token.0 as u64) {
            Ok(()) => Ok(token),
            Err(err) => {
                // Roll back: don't retain a record the kernel never accepted.
                let _ = self.registry.remove(fd);
                Err(err)
            }
        }
    }

    /// Fails with [`CoreError::NoSuchRegistration`] if `fd` was never
    /// attached.
    pub(crate) fn detach(&mut self, fd: RawFd) -> Result<(), CoreError> {
        self.registry.remove(fd)?;
        // epoll_ctl(DEL) failing here (fd already closed, say) is not a
        // reason to resurrect the bookkeeping we just tore down: the
        // registration is gone from our side regardless.
        let _ = self.selector.deregister(fd);
        Ok(())
    }

    /// Blocks on the kernel for up to `timeout`, `None` meaning
    /// indefinitely, filling the internal event buffer. Errors are the
    /// caller's (the `Core` tick loop's) to log-and-ignore.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        let timeout_ms = match timeout {
            None => -1,
            Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        };
        self.selector.select(&mut self.events, timeout_ms)
    }

    pub(crate) fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Decodes the last `poll()` batch into `(Token, close/read/write)`
    /// triples, re-validating each token against the registry as it goes
    /// (the tombstone check).
    pub(crate) fn ready_events(&self) -> Vec<ReadyEvent> {
        self.events
            .iter()
            .filter_map(|ev| {
                let token = Token(crate::sys::event_data(ev) as usize);
                if self.registry.get(token).is_none() {
                    return None;
                }
                Some(ReadyEvent {
                    token,
                    is_close: crate::sys::is_error_or_hup(ev),
                    is_read: crate::sys::is_readable(ev),
                    is_write: crate::sys::is_writable(ev),
                })
            })
            .collect()
    }

    /// Re-fetches a record by token, returning `None` if it has been
    /// detached since the batch was decoded (e.g. by an earlier callback
    /// in the same tick).
    pub(crate) fn record(&self, token: Token) -> Option<&EventRecord> {
        self.registry.get(token)
    }

    pub(crate) fn null_count(&self) -> usize {
        self.registry.null_count()
    }

    pub(crate) fn compact(&mut self) {
        self.registry.compact();
    }
}
