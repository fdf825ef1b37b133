//! Non-blocking TCP sockets.
//!
//! Grounded on `examples/original_source/include/corosig/io/TcpSocket.hpp`.

use std::mem::size_of;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use crate::awaitables::PollEvent;
use crate::cx::Cx;
use crate::error::{IoError, SyscallError};
use crate::list::PollKind;

/// Fills a `sockaddr_storage` from a Rust `SocketAddr`, the layout
/// `connect(2)`/`bind(2)` need. Shared with `udp.rs`.
pub(crate) fn to_sockaddr(addr: SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, sin);
            }
            (storage, size_of::<libc::sockaddr_in>() as libc::socklen_t)
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: v6.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: v6.scope_id(),
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, sin6);
            }
            (storage, size_of::<libc::sockaddr_in6>() as libc::socklen_t)
        }
    }
}

fn new_nonblocking_socket(domain: libc::c_int) -> Result<RawFd, SyscallError> {
    let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, 0) };
    if fd < 0 {
        return Err(SyscallError::last_os_error());
    }
    Ok(fd)
}

fn domain_of(addr: SocketAddr) -> libc::c_int {
    match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    }
}

/// A connected, non-blocking TCP stream.
pub struct TcpSocket {
    fd: RawFd,
}

impl TcpSocket {
    pub async fn connect(cx: Cx<'_>, addr: SocketAddr) -> Result<Self, IoError> {
        let fd = new_nonblocking_socket(domain_of(addr))?;
        let (storage, len) = to_sockaddr(addr);
        let rc = unsafe {
            libc::connect(fd, &storage as *const _ as *const libc::sockaddr, len)
        };
        if rc == 0 {
            return Ok(Self { fd });
        }
        let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if code != libc::EINPROGRESS {
            unsafe { libc::close(fd) };
            return Err(SyscallError::from_raw(code).into());
        }
        PollEvent::new(cx, fd, PollKind::Write).await;
        let mut err: libc::c_int = 0;
        let mut errlen = size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut _ as *mut libc::c_void,
                &mut errlen,
            )
        };
        if rc < 0 {
            let e = SyscallError::last_os_error();
            unsafe { libc::close(fd) };
            return Err(e.into());
        }
        if err != 0 {
            unsafe { libc::close(fd) };
            return Err(SyscallError::from_raw(err).into());
        }
        Ok(Self { fd })
    }

    pub fn underlying_handle(&self) -> RawFd {
        self.fd
    }

    pub fn try_read_some(&self, buf: &mut [u8]) -> Result<Option<usize>, SyscallError> {
        super::posix::try_read_some(self.fd, buf)
    }

    pub fn try_write_some(&self, buf: &[u8]) -> Result<Option<usize>, SyscallError> {
        super::posix::try_write_some(self.fd, buf)
    }

    pub async fn read_some(&self, cx: Cx<'_>, buf: &mut [u8]) -> Result<usize, IoError> {
        super::posix::read_some(cx, self.fd, buf).await
    }

    pub async fn write_some(&self, cx: Cx<'_>, buf: &[u8]) -> Result<usize, IoError> {
        super::posix::write_some(cx, self.fd, buf).await
    }

    pub async fn read(&self, cx: Cx<'_>, buf: &mut [u8]) -> Result<usize, IoError> {
        super::posix::read_full(cx, self.fd, buf).await
    }

    pub async fn write(&self, cx: Cx<'_>, buf: &[u8]) -> Result<usize, IoError> {
        super::posix::write_full(cx, self.fd, buf).await
    }

    /// Closes the socket, reporting any error from `close(2)` rather than
    /// swallowing it the way `Drop` must.
    pub fn close(self) -> Result<(), SyscallError> {
        let fd = self.fd;
        std::mem::forget(self);
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            return Err(SyscallError::last_os_error());
        }
        Ok(())
    }
}

impl Drop for TcpSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// A non-blocking listening TCP socket.
pub struct TcpListener {
    fd: RawFd,
}

impl TcpListener {
    pub fn bind(addr: SocketAddr, backlog: i32) -> Result<Self, SyscallError> {
        let fd = new_nonblocking_socket(domain_of(addr))?;
        let one: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &one as *const _ as *const libc::c_void,
                size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
        let (storage, len) = to_sockaddr(addr);
        let rc = unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) };
        if rc < 0 {
            let e = SyscallError::last_os_error();
            unsafe { libc::close(fd) };
            return Err(e);
        }
        let rc = unsafe { libc::listen(fd, backlog) };
        if rc < 0 {
            let e = SyscallError::last_os_error();
            unsafe { libc::close(fd) };
            return Err(e);
        }
        Ok(Self { fd })
    }

    pub fn underlying_handle(&self) -> RawFd {
        self.fd
    }

    pub async fn accept(&self, cx: Cx<'_>) -> Result<TcpSocket, IoError> {
        loop {
            let fd = unsafe {
                libc::accept4(
                    self.fd,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    libc::SOCK_NONBLOCK,
                )
            };
            if fd >= 0 {
                return Ok(TcpSocket { fd });
            }
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINTR {
                PollEvent::new(cx, self.fd, PollKind::Read).await;
                continue;
            }
            return Err(SyscallError::from_raw(code).into());
        }
    }

    /// Closes the listening socket, reporting any error from `close(2)`
    /// rather than swallowing it the way `Drop` must.
    pub fn close(self) -> Result<(), SyscallError> {
        let fd = self.fd;
        std::mem::forget(self);
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            return Err(SyscallError::last_os_error());
        }
        Ok(())
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
