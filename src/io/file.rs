//! Non-blocking file access.
//!
//! Grounded on `examples/original_source/include/corosig/io/File.hpp`.

use std::os::unix::io::RawFd;

use bitflags::bitflags;

use crate::cx::Cx;
use crate::error::{IoError, SyscallError};

bitflags! {
    /// Mirrors the source's `File::Flags` bitmask, minus `O_NONBLOCK` —
    /// this crate always opens files non-blocking internally and never
    /// exposes that choice to the caller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ_ONLY  = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const READ_WRITE = 1 << 2;
        const CREATE     = 1 << 3;
        const TRUNCATE   = 1 << 4;
        const APPEND     = 1 << 5;
    }
}

impl OpenFlags {
    fn to_libc(self) -> libc::c_int {
        let mut raw = libc::O_NONBLOCK;
        raw |= if self.contains(OpenFlags::READ_WRITE) {
            libc::O_RDWR
        } else if self.contains(OpenFlags::WRITE_ONLY) {
            libc::O_WRONLY
        } else {
            libc::O_RDONLY
        };
        if self.contains(OpenFlags::CREATE) {
            raw |= libc::O_CREAT;
        }
        if self.contains(OpenFlags::TRUNCATE) {
            raw |= libc::O_TRUNC;
        }
        if self.contains(OpenFlags::APPEND) {
            raw |= libc::O_APPEND;
        }
        raw
    }
}

/// A non-blocking file handle.
pub struct File {
    fd: RawFd,
}

impl File {
    pub fn open(path: &std::ffi::CStr, flags: OpenFlags, mode: u32) -> Result<Self, SyscallError> {
        let fd = unsafe { libc::open(path.as_ptr(), flags.to_libc(), mode as libc::mode_t) };
        if fd < 0 {
            return Err(SyscallError::last_os_error());
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

    /// Closes the file, reporting any error from `close(2)` rather than
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

impl Drop for File {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
