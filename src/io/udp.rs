//! Non-blocking UDP sockets.
//!
//! Grounded on `examples/original_source/include/corosig/io/UdpSocket.hpp`.

use std::mem::size_of;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use crate::awaitables::PollEvent;
use crate::cx::Cx;
use crate::error::{IoError, SyscallError};
use crate::list::PollKind;

use super::tcp::to_sockaddr;

pub struct UdpSocket {
    fd: RawFd,
}

impl UdpSocket {
    pub fn bind(addr: SocketAddr) -> Result<Self, SyscallError> {
        let domain = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM | libc::SOCK_NONBLOCK, 0) };
        if fd < 0 {
            return Err(SyscallError::last_os_error());
        }
        let (storage, len) = to_sockaddr(addr);
        let rc = unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) };
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

    pub async fn send_to(&self, cx: Cx<'_>, buf: &[u8], addr: SocketAddr) -> Result<usize, IoError> {
        let (storage, len) = to_sockaddr(addr);
        loop {
            let rc = unsafe {
                libc::sendto(
                    self.fd,
                    buf.as_ptr() as *const libc::c_void,
                    buf.len(),
                    0,
                    &storage as *const _ as *const libc::sockaddr,
                    len,
                )
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINTR {
                PollEvent::new(cx, self.fd, PollKind::Write).await;
                continue;
            }
            return Err(SyscallError::from_raw(code).into());
        }
    }

    pub async fn recv_from(
        &self,
        cx: Cx<'_>,
        buf: &mut [u8],
    ) -> Result<(usize, SocketAddr), IoError> {
        loop {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let rc = unsafe {
                libc::recvfrom(
                    self.fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                    &mut storage as *mut _ as *mut libc::sockaddr,
                    &mut len,
                )
            };
            if rc >= 0 {
                let addr = from_sockaddr(&storage);
                return Ok((rc as usize, addr));
            }
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINTR {
                PollEvent::new(cx, self.fd, PollKind::Read).await;
                continue;
            }
            return Err(SyscallError::from_raw(code).into());
        }
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

impl Drop for UdpSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

fn from_sockaddr(storage: &libc::sockaddr_storage) -> SocketAddr {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
            SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port)))
        }
        libc::AF_INET6 => {
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            ))
        }
        _ => unreachable!("sockaddr_storage from recvfrom should be AF_INET or AF_INET6"),
    }
}
