use std::convert::From;

/// Associates a registration with the kernel-level readiness event that
/// refers to it.
///
/// A `Token` is opaque bits handed to `epoll_ctl` as `epoll_event.u64` and
/// handed back unchanged by `epoll_wait`. The registry packs a tombstoned
/// slab index and generation into it (see `slab::Handle`) so that a stale
/// event delivered for a slot that has since been reused for something else
/// can be detected and discarded rather than misdispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub usize);

impl From<usize> for Token {
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}
