//! The raw-syscall backend shared by every `io` type.
//!
//! Grounded on `examples/original_source/src/io/posix/FdOps.cpp`.

use std::os::unix::io::RawFd;

use crate::awaitables::PollEvent;
use crate::cx::Cx;
use crate::error::{IoError, SyscallError};
use crate::list::PollKind;

pub(crate) fn set_nonblocking(fd: RawFd) -> Result<(), SyscallError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(SyscallError::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(SyscallError::last_os_error());
    }
    Ok(())
}

fn classify(code: i32) -> bool {
    // EAGAIN and EWOULDBLOCK are the same value on Linux; matching both
    // keeps this correct on platforms where they differ.
    code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINTR
}

pub(crate) fn try_read_some(fd: RawFd, buf: &mut [u8]) -> Result<Option<usize>, SyscallError> {
    let rc = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if rc >= 0 {
        return Ok(Some(rc as usize));
    }
    let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    if classify(code) {
        Ok(None)
    } else {
        Err(SyscallError::from_raw(code))
    }
}

pub(crate) fn try_write_some(fd: RawFd, buf: &[u8]) -> Result<Option<usize>, SyscallError> {
    let rc = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    if rc >= 0 {
        return Ok(Some(rc as usize));
    }
    let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    if classify(code) {
        Ok(None)
    } else {
        Err(SyscallError::from_raw(code))
    }
}

pub(crate) async fn read_some(cx: Cx<'_>, fd: RawFd, buf: &mut [u8]) -> Result<usize, IoError> {
    loop {
        if let Some(n) = try_read_some(fd, buf)? {
            return Ok(n);
        }
        PollEvent::new(cx, fd, PollKind::Read).await;
    }
}

pub(crate) async fn write_some(cx: Cx<'_>, fd: RawFd, buf: &[u8]) -> Result<usize, IoError> {
    loop {
        if let Some(n) = try_write_some(fd, buf)? {
            return Ok(n);
        }
        PollEvent::new(cx, fd, PollKind::Write).await;
    }
}

/// Reads until `buf` is full or EOF. A failure after at least one byte
/// has already landed is swallowed and reported as partial progress,
/// matching the source's `FdOps::read`.
pub(crate) async fn read_full(cx: Cx<'_>, fd: RawFd, mut buf: &mut [u8]) -> Result<usize, IoError> {
    let mut total = 0usize;
    while !buf.is_empty() {
        match read_some(cx, fd, buf).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                buf = &mut buf[n..];
            }
            Err(e) => {
                if total > 0 {
                    return Ok(total);
                }
                return Err(e);
            }
        }
    }
    Ok(total)
}

pub(crate) async fn write_full(cx: Cx<'_>, fd: RawFd, mut buf: &[u8]) -> Result<usize, IoError> {
    let mut total = 0usize;
    while !buf.is_empty() {
        match write_some(cx, fd, buf).await {
            Ok(n) => {
                total += n;
                buf = &buf[n..];
            }
            Err(e) => {
                if total > 0 {
                    return Ok(total);
                }
                return Err(e);
            }
        }
    }
    Ok(total)
}
