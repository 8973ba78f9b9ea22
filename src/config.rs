//! Compile-time tunables.
//!
//! These mirror the `#define`s in `xps.h`: this crate has no TOML/CLI
//! configuration layer, matching the original program, which takes no
//! arguments and hardcodes all of these.

/// Backlog passed to `listen(2)` for listener sockets.
pub const DEFAULT_BACKLOG: libc::c_int = 64;

/// Maximum number of events returned by a single `epoll_wait` call.
pub const MAX_EPOLL_EVENTS: usize = 32;

/// Size of the scratch buffer used for a single `recv`/`send` call.
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;

/// A pipe stops being writable once its buffered length reaches this many
/// bytes, and becomes writable again once it drains below it.
pub const DEFAULT_PIPE_BUFF_THRESH: usize = 1_000_000;

/// Number of tombstoned (null) slots a collection tolerates before the next
/// compaction pass reclaims them.
pub const DEFAULT_NULLS_THRESH: usize = 32;
