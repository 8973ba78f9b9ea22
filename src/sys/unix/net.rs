//! Raw non-blocking socket creation, wrapped the way `mio`'s
//! `sys::unix::socket::Socket` wraps these calls: a thin owned-fd type
//! with one method per syscall, `EINPROGRESS` tolerated on `connect`,
//! `SO_REUSEADDR` set before `bind`, `SOCK_NONBLOCK | SOCK_CLOEXEC` folded
//! into the `socket()` call on Linux instead of a separate `fcntl`.

use std::io;
use std::mem::{self, size_of_val, MaybeUninit};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::sys::unix::macros::syscall;

pub(crate) fn from_socket_addr(addr: &SocketAddr) -> (*const libc::sockaddr, libc::socklen_t) {
    match addr {
        SocketAddr::V4(ref addr) => (addr as *const _ as *const libc::sockaddr, size_of_val(addr) as libc::socklen_t),
        SocketAddr::V6(ref addr) => (addr as *const _ as *const libc::sockaddr, size_of_val(addr) as libc::socklen_t),
    }
}

/// `storage` must be initialised to `sockaddr_in` or `sockaddr_in6`.
pub(crate) unsafe fn to_socket_addr(storage: *const libc::sockaddr_storage) -> io::Result<SocketAddr> {
    match (*storage).ss_family as libc::c_int {
        libc::AF_INET => Ok(SocketAddr::V4(*(storage as *const libc::sockaddr_in as *const _))),
        libc::AF_INET6 => Ok(SocketAddr::V6(*(storage as *const libc::sockaddr_in6 as *const _))),
        _ => Err(io::ErrorKind::InvalidInput.into()),
    }
}

/// An owned socket fd, non-blocking and close-on-exec from the moment it's
/// created.
#[derive(Debug)]
pub(crate) struct Socket {
    fd: OwnedFd,
}

impl Socket {
    fn new(domain: libc::c_int, socket_type: libc::c_int) -> io::Result<Socket> {
        let socket_type = socket_type | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
        let fd = syscall!(socket(domain, socket_type, 0))?;
        Ok(Socket { fd: unsafe { OwnedFd::from_raw_fd(fd) } })
    }

    pub(crate) fn stream(addr: &SocketAddr) -> io::Result<Socket> {
        let domain = match addr {
            SocketAddr::V4(..) => libc::AF_INET,
            SocketAddr::V6(..) => libc::AF_INET6,
        };
        Socket::new(domain, libc::SOCK_STREAM)
    }

    pub(crate) fn set_reuse_address(&self) -> io::Result<()> {
        let enable: libc::c_int = 1;
        syscall!(setsockopt(
            self.fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &enable as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    pub(crate) fn bind(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = from_socket_addr(addr);
        syscall!(bind(self.fd.as_raw_fd(), storage, len)).map(|_| ())
    }

    pub(crate) fn listen(&self, backlog: libc::c_int) -> io::Result<()> {
        syscall!(listen(self.fd.as_raw_fd(), backlog)).map(|_| ())
    }

    /// `getsockname(2)`: the address actually bound, which is what matters
    /// when `bind()` was called with port `0` and the kernel picked one.
    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage = unsafe { MaybeUninit::<libc::sockaddr_storage>::zeroed().assume_init() };
        let mut len = mem::size_of_val(&storage) as libc::socklen_t;
        syscall!(getsockname(self.fd.as_raw_fd(), &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr, &mut len))?;
        unsafe { to_socket_addr(&storage as *const libc::sockaddr_storage) }
    }

    /// Returns `Ok(())` whether the connect completed immediately or is
    /// still in progress (`EINPROGRESS`); readiness for the completion is
    /// then reported the normal way, via `EPOLLOUT`.
    pub(crate) fn connect(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = from_socket_addr(addr);
        match syscall!(connect(self.fd.as_raw_fd(), storage, len)) {
            Ok(_) => Ok(()),
            Err(err) if err.raw_os_error() == Some(libc::EINPROGRESS) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Accepts one connection. `Ok(None)` means `EAGAIN`/`EWOULDBLOCK`: the
    /// listener's accept loop stops on this.
    pub(crate) fn accept(&self) -> io::Result<Option<(Socket, SocketAddr)>> {
        let mut storage = unsafe { MaybeUninit::<libc::sockaddr_storage>::zeroed().assume_init() };
        let mut len = mem::size_of_val(&storage) as libc::socklen_t;

        let fd = match syscall!(accept4(
            self.fd.as_raw_fd(),
            &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
        )) {
            Ok(fd) => fd,
            Err(err) if matches!(err.raw_os_error(), Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let addr = unsafe { to_socket_addr(&storage as *const libc::sockaddr_storage)? };
        Ok(Some((Socket { fd: unsafe { OwnedFd::from_raw_fd(fd) } }, addr)))
    }

    pub(crate) fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = syscall!(recv(self.fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0))?;
        Ok(n as usize)
    }

    /// `MSG_NOSIGNAL` turns a write to a peer-closed socket into `EPIPE`
    /// instead of raising `SIGPIPE`.
    pub(crate) fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let n = syscall!(send(self.fd.as_raw_fd(), buf.as_ptr() as *const libc::c_void, buf.len(), libc::MSG_NOSIGNAL))?;
        Ok(n as usize)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}

impl FromRawFd for Socket {
    unsafe fn from_raw_fd(fd: RawFd) -> Socket {
        Socket { fd: OwnedFd::from_raw_fd(fd) }
    }
}
