//! Non-blocking pipes and the standard streams.
//!
//! Grounded on `examples/original_source/include/corosig/io/Pipe.hpp`.

use std::os::unix::io::RawFd;

use crate::cx::Cx;
use crate::error::{IoError, SyscallError};

use super::posix::set_nonblocking;

/// The read end of a pipe, or a wrapped standard stream.
pub struct PipeRead {
    fd: RawFd,
    owns: bool,
}

/// The write end of a pipe, or a wrapped standard stream.
pub struct PipeWrite {
    fd: RawFd,
    owns: bool,
}

impl PipeRead {
    /// Wraps file descriptor 0. Puts stdin into non-blocking mode, which
    /// affects the whole process, not just this handle — matching the
    /// source's `Pipe::stdin()`.
    pub fn stdin() -> Result<Self, SyscallError> {
        set_nonblocking(libc::STDIN_FILENO)?;
        Ok(Self {
            fd: libc::STDIN_FILENO,
            owns: false,
        })
    }

    pub fn underlying_handle(&self) -> RawFd {
        self.fd
    }

    pub fn try_read_some(&self, buf: &mut [u8]) -> Result<Option<usize>, SyscallError> {
        super::posix::try_read_some(self.fd, buf)
    }

    pub async fn read_some(&self, cx: Cx<'_>, buf: &mut [u8]) -> Result<usize, IoError> {
        super::posix::read_some(cx, self.fd, buf).await
    }

    pub async fn read(&self, cx: Cx<'_>, buf: &mut [u8]) -> Result<usize, IoError> {
        super::posix::read_full(cx, self.fd, buf).await
    }

    /// Closes the read end, reporting any error from `close(2)` rather than
    /// swallowing it the way `Drop` must. A handle that wraps a standard
    /// stream it does not own (`stdin()`) is released without touching the
    /// underlying file descriptor, mirroring `Drop`'s `owns` guard.
    pub fn close(self) -> Result<(), SyscallError> {
        let fd = self.fd;
        let owns = self.owns;
        std::mem::forget(self);
        if !owns {
            return Ok(());
        }
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            return Err(SyscallError::last_os_error());
        }
        Ok(())
    }
}

impl PipeWrite {
    pub fn stdout() -> Result<Self, SyscallError> {
        set_nonblocking(libc::STDOUT_FILENO)?;
        Ok(Self {
            fd: libc::STDOUT_FILENO,
            owns: false,
        })
    }

    pub fn stderr() -> Result<Self, SyscallError> {
        set_nonblocking(libc::STDERR_FILENO)?;
        Ok(Self {
            fd: libc::STDERR_FILENO,
            owns: false,
        })
    }

    pub fn underlying_handle(&self) -> RawFd {
        self.fd
    }

    pub fn try_write_some(&self, buf: &[u8]) -> Result<Option<usize>, SyscallError> {
        super::posix::try_write_some(self.fd, buf)
    }

    pub async fn write_some(&self, cx: Cx<'_>, buf: &[u8]) -> Result<usize, IoError> {
        super::posix::write_some(cx, self.fd, buf).await
    }

    pub async fn write(&self, cx: Cx<'_>, buf: &[u8]) -> Result<usize, IoError> {
        super::posix::write_full(cx, self.fd, buf).await
    }

    /// Closes the write end, reporting any error from `close(2)` rather
    /// than swallowing it the way `Drop` must. A handle that wraps a
    /// standard stream it does not own (`stdout()`/`stderr()`) is released
    /// without touching the underlying file descriptor, mirroring `Drop`'s
    /// `owns` guard.
    pub fn close(self) -> Result<(), SyscallError> {
        let fd = self.fd;
        let owns = self.owns;
        std::mem::forget(self);
        if !owns {
            return Ok(());
        }
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            return Err(SyscallError::last_os_error());
        }
        Ok(())
    }
}

impl Drop for PipeRead {
    fn drop(&mut self) {
        if self.owns {
            unsafe { libc::close(self.fd) };
        }
    }
}

impl Drop for PipeWrite {
    fn drop(&mut self) {
        if self.owns {
            unsafe { libc::close(self.fd) };
        }
    }
}

/// A freshly-created, anonymous, non-blocking pipe.
pub struct PipePair {
    pub read: PipeRead,
    pub write: PipeWrite,
}

impl PipePair {
    pub fn make() -> Result<Self, SyscallError> {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(SyscallError::last_os_error());
        }
        Ok(Self {
            read: PipeRead {
                fd: fds[0],
                owns: true,
            },
            write: PipeWrite {
                fd: fds[1],
                owns: true,
            },
        })
    }
}
