//! A single-threaded, edge-triggered TCP proxy runtime core: an
//! epoll-backed event loop, a bounded back-pressured pipe abstraction, and a
//! connection model gluing the two together.
//!
//! This crate is deliberately narrow: no multi-threading, no TLS, no
//! application protocol, no persistent state. It answers one question —
//! how do you move bytes between non-blocking sockets safely and fairly
//! under edge-triggered readiness — and nothing else. [`Core`] is the
//! entry point. [`Core::bind`] registers a listener in the self-looped
//! echo configuration; [`Core::bind_proxy`] registers one in the
//! client<->upstream proxy configuration, dialing a fresh
//! [`upstream::connect`] per accepted client and wiring the pair with
//! [`Core::pair`]; [`Core::run`] drives any mix of listeners forever.
//!
//! See `demos/echo_server.rs`, `demos/reverse_echo.rs`, and
//! `demos/proxy.rs` for runnable examples.

mod buffer;
mod config;
mod connection;
mod core;
mod error;
mod event_loop;
mod interest;
mod listener;
#[cfg(feature = "logger-init")]
pub mod logging;
mod pipe;
mod registry;
pub mod signal;
mod slab;
mod sys;
mod token;
pub mod upstream;

pub use crate::config::{DEFAULT_BACKLOG, DEFAULT_BUFFER_SIZE, DEFAULT_NULLS_THRESH, DEFAULT_PIPE_BUFF_THRESH, MAX_EPOLL_EVENTS};
pub use crate::connection::{set_sink_handler, ConnectionHandle};
pub use crate::core::Core;
pub use crate::error::CoreError;
pub use crate::interest::Interest;
pub use crate::listener::ListenerHandle;

/// A connection-facing callback: exactly the shape of a [`Connection`]'s
/// source and sink handlers (`fn(&mut Core, ConnectionHandle)`), exposed so
/// an embedder can swap one in via [`set_sink_handler`] — the one knob the
/// core's otherwise-verbatim byte mover leaves open for layering
/// application logic on top (see `demos/reverse_echo.rs`).
///
/// [`Connection`]: crate::connection::Connection
pub type ConnectionHandler = fn(&mut Core, ConnectionHandle);
