//! Platform glue. This crate targets Linux/epoll specifically — unlike
//! `mio`, there is no kqueue/IOCP/wasi branch here, only the one this
//! runtime actually ships on. The module split mirrors `mio`'s own
//! `sys::unix`/`sys::windows` separation anyway, so that a future port is
//! a matter of adding a sibling module, not restructuring the crate.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::{event_data, is_error_or_hup, is_readable, is_writable, Event, Events, Selector, Socket};
