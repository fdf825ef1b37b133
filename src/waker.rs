//! A `Waker` that does nothing.
//!
//! This runtime never relies on `Waker::wake()` to know when to resume a
//! suspended frame — the reactor decides that by which list ([`crate::list`])
//! a frame's `Link` sits in. A `Waker` is still required to call
//! `std::future::Future::poll`, so every resume installs this same
//! no-op, allocation-free one.

use std::task::{RawWaker, RawWakerVTable, Waker};

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, do_nothing, do_nothing, do_nothing);

unsafe fn clone(_: *const ()) -> RawWaker {
    RawWaker::new(std::ptr::null(), &VTABLE)
}

unsafe fn do_nothing(_: *const ()) {}

/// Builds a `Waker` backed by no allocation and no state.
pub(crate) fn create() -> Waker {
    let raw = RawWaker::new(std::ptr::null(), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}
