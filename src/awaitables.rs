//! The three leaf awaitables every composition primitive is built from,
//! plus [`Join`], the bridge that lets one coroutine `.await` another's
//! [`Fut`].
//!
//! Each follows the same two-poll shape: the first poll registers the
//! frame into whichever reactor list it is waiting on (via [`Cx`], not
//! `std::task::Waker`) and returns `Pending`; the reactor only ever
//! resumes a frame once that wait is actually satisfied, so the second
//! poll can unconditionally return `Ready`. This mirrors
//! `examples/original_source/include/corosig/{Yield,Sleep,PollEvent}.hpp`,
//! where `await_suspend` registers with the reactor and `await_resume`
//! trusts that registration.

use std::future::Future;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::clock::Instant;
use crate::cx::Cx;
use crate::future::Fut;

// `PollKind` lives in the crate-private `list` module alongside the other
// intrusive-list plumbing, but `PollEvent::new` takes one as a public
// parameter, so it needs a public path to be named from outside the crate.
pub use crate::list::PollKind;

/// Suspends until the reactor's next event-loop iteration.
pub struct Yield<'r> {
    cx: Cx<'r>,
    queued: bool,
}

impl<'r> Yield<'r> {
    pub fn new(cx: Cx<'r>) -> Self {
        Self { cx, queued: false }
    }
}

impl Future for Yield<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.queued {
            return Poll::Ready(());
        }
        this.queued = true;
        this.cx.reactor().schedule_yield(this.cx.me());
        Poll::Pending
    }
}

/// Suspends until at least `duration` has elapsed.
pub struct Sleep<'r> {
    cx: Cx<'r>,
    deadline: Instant,
    queued: bool,
}

impl<'r> Sleep<'r> {
    pub fn new(cx: Cx<'r>, duration: Duration) -> Self {
        let now = Instant::now().unwrap_or(Instant::from_nanos(0));
        let deadline = now.checked_add(duration).unwrap_or(now);
        Self {
            cx,
            deadline,
            queued: false,
        }
    }
}

impl Future for Sleep<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.queued {
            return Poll::Ready(());
        }
        this.queued = true;
        this.cx.reactor().schedule_timer(this.cx.me(), this.deadline);
        Poll::Pending
    }
}

/// Suspends until `fd` is ready for `kind` of I/O, as reported by
/// `poll(2)`. The reactor does not perform the read or write itself; a
/// caller retries its syscall after this resolves (see [`crate::io`]).
pub struct PollEvent<'r> {
    cx: Cx<'r>,
    fd: RawFd,
    kind: PollKind,
    queued: bool,
}

impl<'r> PollEvent<'r> {
    pub fn new(cx: Cx<'r>, fd: RawFd, kind: PollKind) -> Self {
        Self {
            cx,
            fd,
            kind,
            queued: false,
        }
    }
}

impl Future for PollEvent<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.queued {
            return Poll::Ready(());
        }
        this.queued = true;
        this.cx
            .reactor()
            .schedule_poll(this.cx.me(), this.fd, this.kind);
        Poll::Pending
    }
}

/// Awaits a child coroutine's [`Fut`] from within another coroutine body.
///
/// This is how nested composition happens in this runtime: rather than a
/// blanket `Future` impl on `Fut` that somehow recovers "who is awaiting
/// me" from `std::task::Context`, the awaiting coroutine's own `Cx` (a
/// plain local variable, alive across the `.await` point like any other)
/// is threaded in explicitly and used to register itself as the child's
/// waiting parent.
pub struct Join<'r, T, E> {
    cx: Cx<'r>,
    child: Fut<'r, T, E>,
    registered: bool,
}

impl<'r, T, E> Join<'r, T, E> {
    pub fn new(cx: Cx<'r>, child: Fut<'r, T, E>) -> Self {
        Self {
            cx,
            child,
            registered: false,
        }
    }
}

impl<'r, T, E> Future for Join<'r, T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.child.try_take() {
            return Poll::Ready(result);
        }
        if !this.registered {
            this.child.register_waiting_parent(this.cx.me());
            this.registered = true;
        }
        Poll::Pending
    }
}

impl<'r> Cx<'r> {
    /// Shorthand for `.await`ing a child coroutine's handle from within
    /// another coroutine body: `cx.join(child).await`.
    pub fn join<T, E>(&self, child: Fut<'r, T, E>) -> Join<'r, T, E> {
        Join::new(*self, child)
    }
}
