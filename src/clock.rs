//! Monotonic time for [`crate::awaitables::Sleep`] and timeout computation.
//!
//! The source's `Clock::now()` reads `CLOCK_REALTIME`, which is wrong for
//! measuring durations (it can jump backwards under NTP adjustment); this
//! crate uses `CLOCK_MONOTONIC` instead, as the design notes require.

use std::fmt;

/// A point in time, expressed as nanoseconds since an arbitrary, fixed
/// epoch (the process's `CLOCK_MONOTONIC` origin). Only differences
/// between two `Instant`s are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(i64);

impl Instant {
    /// Samples the monotonic clock. Returns `None` if the underlying
    /// `clock_gettime` call fails (a `SyscallError` can be recovered with
    /// [`crate::error::SyscallError::last_os_error`] immediately after).
    pub fn now() -> Option<Self> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable `timespec`.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            return None;
        }
        Some(Instant(ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64))
    }

    pub(crate) fn as_nanos(self) -> i64 {
        self.0
    }

    pub(crate) fn from_nanos(ns: i64) -> Self {
        Instant(ns)
    }

    pub fn checked_add(self, d: std::time::Duration) -> Option<Self> {
        i64::try_from(d.as_nanos())
            .ok()
            .and_then(|dn| self.0.checked_add(dn))
            .map(Instant)
    }

    pub fn duration_since(self, earlier: Self) -> std::time::Duration {
        std::time::Duration::from_nanos((self.0 - earlier.0).max(0) as u64)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
