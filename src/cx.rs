//! The explicit substitute for a C++ coroutine's implicit `promise_type`
//! access.
//!
//! Every coroutine function in this crate takes a `Cx<'_>` as its first
//! parameter, and every awaitable is constructed from one. It bundles a
//! reference to the owning reactor with a type-erased handle to the frame
//! currently being polled, so an awaitable can register itself — "queue
//! myself to the reactor" in the source's terms — without the compiler
//! handing it a promise object for free.

use crate::list::Link;
use crate::reactor::Reactor;

/// A cheap, `Copy` handle threaded through a coroutine body and every
/// awaitable it constructs.
#[derive(Clone, Copy)]
pub struct Cx<'r> {
    reactor: &'r Reactor<'r>,
    me: *mut Link,
}

impl<'r> Cx<'r> {
    pub(crate) fn new(reactor: &'r Reactor<'r>, me: *mut Link) -> Self {
        Self { reactor, me }
    }

    /// The reactor this coroutine is running under.
    pub fn reactor(&self) -> &'r Reactor<'r> {
        self.reactor
    }

    pub(crate) fn me(&self) -> *mut Link {
        self.me
    }
}
