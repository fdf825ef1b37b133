//! Intrusive, allocation-free linking for suspended coroutine frames.
//!
//! Every coroutine frame embeds one [`Link`] as the first field of its
//! [`crate::future::Header`]. The reactor never allocates a list node of its
//! own: the ready queue, the poll-wait list and the timer queue are all
//! built by threading `Link::next` pointers through frames that already
//! exist, the Rust substitute named in the design notes for the source's
//! Boost.Intrusive lists (`CoroList`, `PollList`, `SleepList`).
//!
//! A frame is a member of at most one of these lists at a time, since a
//! suspended coroutine is always waiting on exactly one thing.

use std::cell::Cell;
use std::os::unix::io::RawFd;

/// Which kind of readiness a frame parked in the poll list is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Read,
    Write,
}

/// The erased function table behind every frame's [`Link`].
///
/// Both functions are monomorphized once per concrete coroutine body but
/// share this one non-generic signature, exactly as `std::task::RawWaker`
/// erases a waker's concrete type behind a fixed vtable shape.
pub(crate) struct LinkVtable {
    /// Drives one step of the underlying future. Returns `true` once the
    /// coroutine has produced its final value.
    pub(crate) poll: unsafe fn(*mut Link, &crate::reactor::Reactor<'_>) -> bool,
    /// Drops the future in place and frees the frame's allocation. Called
    /// exactly once, by the owning [`crate::future::Fut`] handle's `Drop`.
    pub(crate) drop_and_free: unsafe fn(*mut Link, &crate::reactor::Reactor<'_>),
}

/// The common, type-erased head of every coroutine frame.
#[repr(C)]
pub(crate) struct Link {
    pub(crate) next: Cell<*mut Link>,
    pub(crate) vtable: &'static LinkVtable,
    /// Meaningful only while linked into the reactor's timer queue.
    pub(crate) deadline_ns: Cell<i64>,
    /// Meaningful only while linked into the reactor's poll-wait list.
    pub(crate) fd: Cell<RawFd>,
    pub(crate) want: Cell<PollKind>,
    /// Meaningful only while linked into a `Semaphore`'s waiter queue.
    pub(crate) want_units: Cell<usize>,
}

impl Link {
    pub(crate) fn new(vtable: &'static LinkVtable) -> Self {
        Self {
            next: Cell::new(std::ptr::null_mut()),
            vtable,
            deadline_ns: Cell::new(0),
            fd: Cell::new(-1),
            want: Cell::new(PollKind::Read),
            want_units: Cell::new(0),
        }
    }
}

/// A FIFO singly-linked queue of frames, used for the ready queue and the
/// poll-wait list. Mirrors the source's `bi::slist<..., cache_last<true>>`.
#[derive(Default)]
pub(crate) struct Queue {
    head: *mut Link,
    tail: *mut Link,
}

impl Queue {
    pub(crate) const fn new() -> Self {
        Self {
            head: std::ptr::null_mut(),
            tail: std::ptr::null_mut(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// The front of the queue, without removing it.
    pub(crate) fn front(&self) -> Option<*mut Link> {
        if self.head.is_null() {
            None
        } else {
            Some(self.head)
        }
    }

    /// Pushes `link` onto the back. `link` must not already be linked
    /// anywhere else.
    pub(crate) fn push_back(&mut self, link: *mut Link) {
        unsafe { (*link).next.set(std::ptr::null_mut()) };
        if self.tail.is_null() {
            self.head = link;
        } else {
            unsafe { (*self.tail).next.set(link) };
        }
        self.tail = link;
    }

    /// Pops the front of the queue, if any.
    pub(crate) fn pop_front(&mut self) -> Option<*mut Link> {
        if self.head.is_null() {
            return None;
        }
        let front = self.head;
        let next = unsafe { (*front).next.get() };
        self.head = next;
        if next.is_null() {
            self.tail = std::ptr::null_mut();
        }
        unsafe { (*front).next.set(std::ptr::null_mut()) };
        Some(front)
    }

    /// Removes every node whose file descriptor matches `fd` and whose
    /// `want` matches `kind`, pushing each one (in list order) onto `out`
    /// directly — no intermediate buffer, so this never allocates.
    pub(crate) fn drain_matching(&mut self, fd: RawFd, kind: PollKind, out: &mut Queue) {
        let mut prev: *mut Link = std::ptr::null_mut();
        let mut it = self.head;
        while !it.is_null() {
            let next = unsafe { (*it).next.get() };
            let matches = unsafe { (*it).fd.get() == fd && (*it).want.get() == kind };
            if matches {
                if prev.is_null() {
                    self.head = next;
                } else {
                    unsafe { (*prev).next.set(next) };
                }
                if it == self.tail {
                    self.tail = prev;
                }
                unsafe { (*it).next.set(std::ptr::null_mut()) };
                out.push_back(it);
            } else {
                prev = it;
            }
            it = next;
        }
    }

    /// Iterates `(fd, want)` pairs currently parked in this list, for
    /// building a `poll(2)` fd set.
    pub(crate) fn iter_fds(&self) -> impl Iterator<Item = (RawFd, PollKind)> + '_ {
        let mut it = self.head;
        std::iter::from_fn(move || {
            if it.is_null() {
                return None;
            }
            let fd = unsafe { (*it).fd.get() };
            let want = unsafe { (*it).want.get() };
            it = unsafe { (*it).next.get() };
            Some((fd, want))
        })
    }
}

/// A list of frames sorted by `deadline_ns`, ascending. Insertion is O(n);
/// this crate targets small, bounded frame counts, so an intrusive sorted
/// list stays simpler (and just as allocation-free) as the source's
/// `avl_multiset` without needing an intrusive tree implementation.
#[derive(Default)]
pub(crate) struct TimerQueue {
    head: *mut Link,
}

impl TimerQueue {
    pub(crate) const fn new() -> Self {
        Self {
            head: std::ptr::null_mut(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub(crate) fn insert(&mut self, link: *mut Link) {
        let deadline = unsafe { (*link).deadline_ns.get() };
        let mut prev: *mut Link = std::ptr::null_mut();
        let mut it = self.head;
        while !it.is_null() && unsafe { (*it).deadline_ns.get() } <= deadline {
            prev = it;
            it = unsafe { (*it).next.get() };
        }
        unsafe { (*link).next.set(it) };
        if prev.is_null() {
            self.head = link;
        } else {
            unsafe { (*prev).next.set(link) };
        }
    }

    /// Removes every node whose deadline is `<= now_ns`, in ascending
    /// deadline order, pushing each one onto `out` directly — no
    /// intermediate buffer, so this never allocates.
    pub(crate) fn drain_due(&mut self, now_ns: i64, out: &mut Queue) {
        while !self.head.is_null() && unsafe { (*self.head).deadline_ns.get() } <= now_ns {
            let due = self.head;
            self.head = unsafe { (*due).next.get() };
            unsafe { (*due).next.set(std::ptr::null_mut()) };
            out.push_back(due);
        }
    }

    /// The soonest deadline still pending, if any.
    pub(crate) fn next_deadline(&self) -> Option<i64> {
        if self.head.is_null() {
            None
        } else {
            Some(unsafe { (*self.head).deadline_ns.get() })
        }
    }
}
