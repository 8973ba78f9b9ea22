//! `Registry`: the fd→registration bookkeeping subordinate to
//! `EventLoop`. Backed by a generational [`Slab`] rather than a linear
//! scan, plus an `fd -> Handle` index, so `attach`/`detach` stay O(1)
//! amortised.
//!
//! `Token`s handed to the kernel selector are a packed [`slab::Handle`]:
//! decoding one back on the return path from `epoll_wait` revalidates the
//! registration in O(1) via a generation check, rather than a linear scan.

use std::collections::HashMap;
use std::os::fd::RawFd;

use crate::core::LoopOwner;
use crate::error::CoreError;
use crate::slab::{Handle, Slab};
use crate::token::Token;

/// One registration: the triple `(fd, owner, {read_cb, write_cb,
/// close_cb})`. Callbacks are plain `fn` pointers rather than boxed
/// closures — see `DESIGN.md` — dispatched with `(&mut Core, LoopOwner)`
/// so they never need to capture any state beyond what the owner handle
/// already identifies.
#[derive(Debug)]
pub(crate) struct EventRecord {
    pub(crate) fd: RawFd,
    pub(crate) owner: LoopOwner,
    pub(crate) read_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
    pub(crate) write_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
    pub(crate) close_cb: Option<fn(&mut crate::core::Core, LoopOwner)>,
}

#[derive(Default)]
pub(crate) struct Registry {
    records: Slab<EventRecord>,
    by_fd: HashMap<RawFd, Handle>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry { records: Slab::new(), by_fd: HashMap::new() }
    }

    /// Inserts a record for `fd` and returns the `Token` to register with
    /// the kernel selector for it.
    pub(crate) fn insert(&mut self, record: EventRecord) -> Token {
        let fd = record.fd;
        let handle = self.records.insert(record);
        self.by_fd.insert(fd, handle);
        Token(handle.to_bits() as usize)
    }

    /// Removes the record for `fd`. Fails with
    /// [`CoreError::NoSuchRegistration`] if `fd` has no registration.
    pub(crate) fn remove(&mut self, fd: RawFd) -> Result<EventRecord, CoreError> {
        let handle = self.by_fd.remove(&fd).ok_or(CoreError::NoSuchRegistration)?;
        self.records.remove(handle).ok_or(CoreError::NoSuchRegistration)
    }

    pub(crate) fn contains_fd(&self, fd: RawFd) -> bool {
        self.by_fd.contains_key(&fd)
    }

    /// Decodes a kernel-returned token back to a record, or `None` if the
    /// registration it names has since been torn down within this same
    /// dispatch batch (an O(1) generation check).
    pub(crate) fn get(&self, token: Token) -> Option<&EventRecord> {
        self.records.get(Handle::from_bits(token.0 as u64))
    }

    pub(crate) fn null_count(&self) -> usize {
        self.records.null_count()
    }

    pub(crate) fn compact(&mut self) {
        self.records.compact();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_owner() -> LoopOwner {
        // These tests never dereference the owner through `Core`.
        LoopOwner::Connection(Handle::dangling())
    }

    #[test]
    fn insert_then_remove_roundtrips() {
        let mut reg = Registry::new();
        let token = reg.insert(EventRecord { fd: 7, owner: dummy_owner(), read_cb: None, write_cb: None, close_cb: None });
        assert!(reg.get(token).is_some());
        assert!(reg.contains_fd(7));

        reg.remove(7).unwrap();
        assert!(!reg.contains_fd(7));
        assert!(reg.get(token).is_none());
    }

    #[test]
    fn remove_unknown_fd_fails() {
        let mut reg = Registry::new();
        assert_eq!(reg.remove(42).unwrap_err(), CoreError::NoSuchRegistration);
    }
}
