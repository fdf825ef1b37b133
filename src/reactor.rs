//! The single-threaded event loop: fires due timers, drains ready frames,
//! then blocks in `poll(2)` for I/O readiness or the next timer deadline.
//!
//! Grounded on `examples/original_source/include/corosig/reactor/Reactor.hpp`
//! and `src/reactor/Reactor.cpp`: the same three-phase
//! `do_event_loop_iteration()` (resume ready, compute a timeout, poll and
//! resume) with the same `ITERATIONS_LIMIT` guard against a single
//! iteration looping forever on a coroutine that keeps yielding. Logging
//! is layered on with `tracing`, which the teacher carries no equivalent
//! of (see `SPEC_FULL.md` §5).

use std::alloc::Layout;
use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;

use crate::alloc::Allocator;
use crate::clock::Instant;
use crate::error::SyscallError;
use crate::list::{Link, PollKind, Queue, TimerQueue};

/// A single iteration drains at most this many ready frames before moving
/// on to I/O polling, so one coroutine re-queuing itself forever (e.g. via
/// repeated `Yield`) cannot starve the reactor.
pub const ITERATIONS_LIMIT: usize = 1 << 20;

/// The `poll(2)` fd buffer `poll_io` needs each iteration, carved out of
/// the reactor's own `Allocator` instead of the global heap — `run_once`
/// is meant to be driven from inside a signal handler, where `malloc` is
/// not on the async-signal-safe list. Sized exactly once per call rather
/// than grown incrementally, since the element count is always known up
/// front (the poll list's current length). Mirrors the source's
/// allocator-templated `Vector<T, ALLOCATOR>`
/// (`examples/original_source/include/corosig/container/Vector.hpp`),
/// scaled down to a fixed one-shot buffer since nothing here ever needs to
/// grow after construction.
struct PollFdBuf<'a, 'buf> {
    reactor: &'a Reactor<'buf>,
    ptr: NonNull<libc::pollfd>,
    len: usize,
}

impl<'a, 'buf> PollFdBuf<'a, 'buf> {
    /// Allocates room for exactly `len` entries. `None` on allocator
    /// exhaustion, the same fallible shape every other allocating path in
    /// this crate uses.
    fn with_capacity(reactor: &'a Reactor<'buf>, len: usize) -> Option<Self> {
        if len == 0 {
            return Some(Self {
                reactor,
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = Layout::array::<libc::pollfd>(len).ok()?;
        let ptr = reactor.allocate_raw(layout)?;
        Some(Self {
            reactor,
            ptr: ptr.cast(),
            len,
        })
    }

    fn as_mut_slice(&mut self) -> &mut [libc::pollfd] {
        if self.len == 0 {
            &mut []
        } else {
            // SAFETY: `ptr` was allocated for exactly `len` elements and is
            // not aliased — this is the only handle to it.
            unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
        }
    }

    fn as_slice(&self) -> &[libc::pollfd] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
        }
    }
}

impl Drop for PollFdBuf<'_, '_> {
    fn drop(&mut self) {
        if self.len > 0 {
            let layout = Layout::array::<libc::pollfd>(self.len).unwrap();
            self.reactor.deallocate_raw(self.ptr.cast(), layout);
        }
    }
}

pub struct Reactor<'buf> {
    alloc: RefCell<Allocator<'buf>>,
    ready: RefCell<Queue>,
    /// Frames that called `Yield`, promoted to `ready` at the start of the
    /// *next* iteration — this is what makes `Yield` mean "resume on the
    /// next tick" rather than "resume right away".
    yielded: RefCell<Queue>,
    polling: RefCell<Queue>,
    timers: RefCell<TimerQueue>,
}

impl<'buf> Reactor<'buf> {
    /// Builds a reactor over `buf`. The whole buffer is handed to the
    /// allocator; nothing else in this crate ever allocates outside it.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self {
            alloc: RefCell::new(Allocator::new_over(buf)),
            ready: RefCell::new(Queue::new()),
            yielded: RefCell::new(Queue::new()),
            polling: RefCell::new(Queue::new()),
            timers: RefCell::new(TimerQueue::new()),
        }
    }

    pub(crate) fn allocate_raw(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.alloc.borrow_mut().allocate(layout.size(), layout.align())
    }

    pub(crate) fn deallocate_raw(&self, ptr: NonNull<u8>, _layout: Layout) {
        unsafe { self.alloc.borrow_mut().deallocate(Some(ptr)) };
    }

    pub(crate) fn schedule_ready(&self, link: *mut Link) {
        self.ready.borrow_mut().push_back(link);
    }

    pub(crate) fn schedule_yield(&self, link: *mut Link) {
        self.yielded.borrow_mut().push_back(link);
    }

    pub(crate) fn schedule_timer(&self, link: *mut Link, deadline: Instant) {
        unsafe { (*link).deadline_ns.set(deadline.as_nanos()) };
        self.timers.borrow_mut().insert(link);
    }

    pub(crate) fn schedule_poll(&self, link: *mut Link, fd: RawFd, want: PollKind) {
        unsafe {
            (*link).fd.set(fd);
            (*link).want.set(want);
        }
        self.polling.borrow_mut().push_back(link);
    }

    /// Whether any frame is currently parked waiting on something. A
    /// `block_on` loop that sees this go false with its own coroutine
    /// still pending has deadlocked — this runtime has no detector for
    /// that beyond the iteration/allocator limits already in place.
    pub fn has_active_tasks(&self) -> bool {
        !self.ready.borrow().is_empty()
            || !self.yielded.borrow().is_empty()
            || !self.polling.borrow().is_empty()
            || !self.timers.borrow().is_empty()
    }

    /// Runs one iteration of the event loop: promotes yielded frames,
    /// fires due timers, drains the ready queue, then polls for I/O
    /// readiness (blocking up to the next timer deadline, or indefinitely
    /// if nothing is queued to run immediately).
    pub fn run_once(&self) -> Result<(), SyscallError> {
        {
            let mut yielded = self.yielded.borrow_mut();
            let mut ready = self.ready.borrow_mut();
            while let Some(link) = yielded.pop_front() {
                ready.push_back(link);
            }
        }

        if let Some(now) = Instant::now() {
            let mut ready = self.ready.borrow_mut();
            self.timers.borrow_mut().drain_due(now.as_nanos(), &mut ready);
        }

        tracing::trace!(target: "signalcoro::reactor", "draining ready queue");
        let mut drained = 0usize;
        while drained < ITERATIONS_LIMIT {
            let link = { self.ready.borrow_mut().pop_front() };
            let Some(link) = link else { break };
            self.poll_frame(link);
            drained += 1;
        }
        tracing::trace!(target: "signalcoro::reactor", drained, "ready queue drained");

        self.poll_io()
    }

    fn next_timeout_ms(&self) -> i32 {
        if !self.ready.borrow().is_empty() || !self.yielded.borrow().is_empty() {
            return 0;
        }
        match (self.timers.borrow().next_deadline(), Instant::now()) {
            (Some(deadline), Some(now)) => {
                let remaining_ns = deadline - now.as_nanos();
                if remaining_ns <= 0 {
                    0
                } else {
                    ((remaining_ns + 999_999) / 1_000_000).min(i32::MAX as i64) as i32
                }
            }
            (Some(_), None) => 0,
            (None, _) => -1,
        }
    }

    fn poll_io(&self) -> Result<(), SyscallError> {
        let timeout_ms = self.next_timeout_ms();
        if self.polling.borrow().is_empty() && timeout_ms < 0 {
            // nothing left to wait on at all
            return Ok(());
        }

        let count = self.polling.borrow().iter_fds().count();
        if count == 0 {
            if timeout_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(timeout_ms as u64));
            }
            return Ok(());
        }

        let Some(mut pollfds) = PollFdBuf::with_capacity(self, count) else {
            return Err(SyscallError::from_raw(libc::ENOMEM));
        };
        {
            let slots = pollfds.as_mut_slice();
            for (slot, (fd, want)) in slots.iter_mut().zip(self.polling.borrow().iter_fds()) {
                *slot = libc::pollfd {
                    fd,
                    events: match want {
                        PollKind::Read => libc::POLLIN,
                        PollKind::Write => libc::POLLOUT,
                    },
                    revents: 0,
                };
            }
        }

        let slots = pollfds.as_mut_slice();
        let rc = unsafe { libc::poll(slots.as_mut_ptr(), slots.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(());
            }
            tracing::debug!(target: "signalcoro::reactor", ?err, "poll(2) failed");
            return Err(SyscallError::last_os_error());
        }

        for pfd in pollfds.as_slice() {
            if pfd.revents == 0 {
                continue;
            }
            let mut ready = self.ready.borrow_mut();
            if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                self.polling.borrow_mut().drain_matching(pfd.fd, PollKind::Read, &mut ready);
            }
            if pfd.revents & (libc::POLLOUT | libc::POLLERR) != 0 {
                self.polling.borrow_mut().drain_matching(pfd.fd, PollKind::Write, &mut ready);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Reactor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("alloc", &self.alloc.borrow())
            .field("has_active_tasks", &self.has_active_tasks())
            .finish()
    }
}
