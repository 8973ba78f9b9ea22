//! `epoll(7)` wrapper, trimmed to what this crate actually needs: no
//! kqueue branch, no priority/AIO/LIO event kinds, no `Waker` — just one
//! readiness-based multiplexer and the three interests ever registered:
//! read, write, and the error/hangup pair that is always implicitly on.
//!
//! `registry.rs` builds on top of this with the fd/owner bookkeeping;
//! `Selector` itself only knows about fds, interests, and raw
//! `epoll_event`s.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::interest::Interest;
use crate::sys::unix::macros::syscall;

pub(crate) struct Selector {
    epoll_fd: OwnedFd,
}

impl Selector {
    pub(crate) fn new() -> io::Result<Selector> {
        let fd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Selector { epoll_fd: unsafe { OwnedFd::from_raw_fd(fd) } })
    }

    /// Registers `fd` for `interests`, tagging the registration with the
    /// opaque `data` word (a packed `slab::Handle` — see `registry.rs`).
    ///
    /// Always edge-triggered (`EPOLLET`), never level-triggered.
    pub(crate) fn register(&self, fd: RawFd, interests: Interest, data: u64) -> io::Result<()> {
        let mut event = libc::epoll_event { events: interests_to_epoll(interests), u64: data };
        syscall!(epoll_ctl(self.epoll_fd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)).map(|_| ())
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        syscall!(epoll_ctl(self.epoll_fd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())).map(|_| ())
    }

    /// Blocks for `timeout_ms` milliseconds (`-1` = indefinitely, `0` =
    /// return immediately), filling `events` with whatever fired. An
    /// `Err` here (e.g. `EINTR`) is treated by the loop as spurious:
    /// logged and ignored, never fatal.
    pub(crate) fn select(&self, events: &mut Events, timeout_ms: libc::c_int) -> io::Result<()> {
        events.buf.clear();
        events.buf.resize(events.capacity, unsafe { std::mem::zeroed() });
        let n = syscall!(epoll_wait(self.epoll_fd.as_raw_fd(), events.buf.as_mut_ptr(), events.capacity as i32, timeout_ms))?;
        events.buf.truncate(n as usize);
        Ok(())
    }
}

fn interests_to_epoll(interests: Interest) -> u32 {
    let mut kind = libc::EPOLLET;
    if interests.is_readable() {
        kind |= libc::EPOLLIN | libc::EPOLLRDHUP;
    }
    if interests.is_writable() {
        kind |= libc::EPOLLOUT;
    }
    kind as u32
}

pub(crate) type Event = libc::epoll_event;

/// Owned, reusable storage for one `epoll_wait` batch.
///
/// `capacity` is fixed at `MAX_EPOLL_EVENTS` by every caller in this crate
/// rather than a caller-chosen size.
pub(crate) struct Events {
    buf: Vec<Event>,
    capacity: usize,
}

impl Events {
    pub(crate) fn with_capacity(capacity: usize) -> Events {
        Events { buf: Vec::with_capacity(capacity), capacity }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Event> {
        self.buf.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

pub(crate) fn event_data(event: &Event) -> u64 {
    event.u64
}

pub(crate) fn is_error_or_hup(event: &Event) -> bool {
    (event.events as libc::c_int & (libc::EPOLLERR | libc::EPOLLHUP)) != 0
}

pub(crate) fn is_readable(event: &Event) -> bool {
    (event.events as libc::c_int & libc::EPOLLIN) != 0
}

pub(crate) fn is_writable(event: &Event) -> bool {
    (event.events as libc::c_int & libc::EPOLLOUT) != 0
}
