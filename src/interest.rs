use std::fmt;
use std::num::NonZeroU8;

const READABLE: u8 = 0b0001;
const WRITABLE: u8 = 0b0010;

/// Readiness interests a registration can be polled for.
///
/// Only readable/writable are exposed: the core always registers with
/// `EPOLLET` (edge-triggered) and always implicitly receives `EPOLLERR`/
/// `EPOLLHUP`/`EPOLLRDHUP` regardless of which interests were requested, so
/// there is nothing for callers to opt into there. This mirrors the
/// original program, which only ever registers `EPOLLIN`, `EPOLLOUT`, or
/// both.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Interest(NonZeroU8);

impl Interest {
    pub const READABLE: Interest = Interest(match NonZeroU8::new(READABLE) {
        Some(v) => v,
        None => unreachable!(),
    });
    pub const WRITABLE: Interest = Interest(match NonZeroU8::new(WRITABLE) {
        Some(v) => v,
        None => unreachable!(),
    });

    pub const fn add(self, other: Interest) -> Interest {
        match NonZeroU8::new(self.0.get() | other.0.get()) {
            Some(v) => Interest(v),
            None => unreachable!(),
        }
    }

    pub const fn is_readable(self) -> bool {
        self.0.get() & READABLE != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0.get() & WRITABLE != 0
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.is_readable() {
            write!(f, "READABLE")?;
            first = false;
        }
        if self.is_writable() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "WRITABLE")?;
        }
        Ok(())
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;
    fn bitor(self, rhs: Interest) -> Interest {
        self.add(rhs)
    }
}
