//! The coroutine frame: a fixed-size allocation carved out of the
//! reactor's [`crate::alloc::Allocator`], holding a native `async fn`'s
//! compiler-generated state machine plus the bookkeeping the reactor needs
//! to resume it without a heap-allocated `Waker`.
//!
//! Grounded on `examples/original_source/include/corosig/Coro.hpp`
//! (`CoroutinePromiseType`, `Fut<T,E,REACTOR>`): there, a custom
//! `operator new` places the compiler-synthesized frame inside the
//! reactor's arena and the promise object doubles as a list node. Here the
//! same shape is built from ordinary generics: the frame's size is a
//! compile-time property of the `Future` type `F` a coroutine function
//! returns, so it can be allocated *before* that future is ever polled —
//! no two-phase allocation is needed, because `Cx` is passed to the
//! coroutine body explicitly rather than recovered from an implicit
//! promise (see `DESIGN.md`).

use std::alloc::Layout;
use std::cell::Cell;
use std::future::Future;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::pin::Pin;
use std::ptr::{addr_of_mut, NonNull};
use std::task::{Context, Poll};

use crate::cx::Cx;
use crate::error::AllocError;
use crate::list::{Link, LinkVtable};
use crate::reactor::Reactor;

/// The part of a frame's header that depends on the coroutine's result
/// type but not on its concrete `Future` implementation. A `*mut Link` may
/// always be reinterpreted as `*mut Header<T, E>` for the `T, E` the frame
/// was spawned with, since `Header` starts with `Link` as its first field.
#[repr(C)]
pub(crate) struct Header<T, E> {
    pub(crate) link: Link,
    waiting_parent: Cell<*mut Link>,
    completed: Cell<bool>,
    result: Cell<Option<Result<T, E>>>,
}

/// A fully concrete coroutine frame: header plus the generated state
/// machine. `#[repr(C)]` with `header` first is what makes the
/// `*mut Link` / `*mut Header<T, E>` / `*mut Frame<F, T, E>` reinterpret
/// casts throughout this module sound.
#[repr(C)]
struct Frame<F, T, E> {
    header: Header<T, E>,
    future: MaybeUninit<F>,
}

unsafe fn poll_shim<F, T, E>(link: *mut Link, reactor: &Reactor<'_>) -> bool
where
    F: Future<Output = Result<T, E>>,
{
    let frame = link as *mut Frame<F, T, E>;
    let fut_ptr = addr_of_mut!((*frame).future) as *mut F;
    let pinned = Pin::new_unchecked(&mut *fut_ptr);

    let waker = crate::waker::create();
    let mut std_cx = Context::from_waker(&waker);

    match pinned.poll(&mut std_cx) {
        Poll::Pending => false,
        Poll::Ready(output) => {
            (*frame).header.completed.set(true);
            (*frame).header.result.set(Some(output));
            let parent = (*frame).header.waiting_parent.replace(std::ptr::null_mut());
            if !parent.is_null() {
                reactor.schedule_ready(parent);
            }
            true
        }
    }
}

unsafe fn drop_and_free_shim<F, T, E>(link: *mut Link, reactor: &Reactor<'_>)
where
    F: Future<Output = Result<T, E>>,
{
    let frame = link as *mut Frame<F, T, E>;
    std::ptr::drop_in_place(addr_of_mut!((*frame).future) as *mut F);
    let layout = Layout::new::<Frame<F, T, E>>();
    reactor.deallocate_raw(NonNull::new_unchecked(frame as *mut u8), layout);
}

fn vtable_for<F, T, E>() -> &'static LinkVtable
where
    F: Future<Output = Result<T, E>> + 'static,
    T: 'static,
    E: 'static,
{
    struct Holder<F, T, E>(PhantomData<(F, T, E)>);
    impl<F, T, E> Holder<F, T, E>
    where
        F: Future<Output = Result<T, E>> + 'static,
        T: 'static,
        E: 'static,
    {
        const VTABLE: LinkVtable = LinkVtable {
            poll: poll_shim::<F, T, E>,
            drop_and_free: drop_and_free_shim::<F, T, E>,
        };
    }
    &Holder::<F, T, E>::VTABLE
}

impl<'r> Reactor<'r> {
    /// Allocates a frame for `make`'s returned future, runs it once
    /// (coroutines start eagerly, matching the source's
    /// `initial_suspend() -> suspend_never`), and hands back the handle
    /// that owns it.
    ///
    /// `make` receives this coroutine's own [`Cx`] so it can thread it
    /// through to whatever it `.await`s. It is called only after the frame
    /// already exists, so the `Cx` it constructs from is valid for the
    /// whole call.
    pub fn spawn<F, T, E>(
        &'r self,
        make: impl FnOnce(Cx<'r>) -> F,
    ) -> Result<Fut<'r, T, E>, AllocError>
    where
        F: Future<Output = Result<T, E>> + 'static,
        T: 'static,
        E: 'static,
    {
        let layout = Layout::new::<Frame<F, T, E>>();
        let ptr = self.allocate_raw(layout).ok_or(AllocError)?;
        let frame = ptr.as_ptr() as *mut Frame<F, T, E>;

        // SAFETY: `frame` is freshly allocated with `layout`, writable,
        // and not yet observed by anything else.
        unsafe {
            addr_of_mut!((*frame).header.link).write(Link::new(vtable_for::<F, T, E>()));
            addr_of_mut!((*frame).header.waiting_parent).write(Cell::new(std::ptr::null_mut()));
            addr_of_mut!((*frame).header.completed).write(Cell::new(false));
            addr_of_mut!((*frame).header.result).write(Cell::new(None));
        }

        let link_ptr = frame as *mut Link;
        let cx = Cx::new(self, link_ptr);
        let future = make(cx);
        unsafe {
            addr_of_mut!((*frame).future).write(MaybeUninit::new(future));
        }

        let handle = Fut {
            frame: unsafe { NonNull::new_unchecked(link_ptr) },
            reactor: self,
            _marker: PhantomData,
        };

        self.poll_frame(link_ptr);
        Ok(handle)
    }

    pub(crate) fn poll_frame(&self, link: *mut Link) -> bool {
        let vtable = unsafe { (*link).vtable };
        unsafe { (vtable.poll)(link, self) }
    }
}

/// An owning handle to a running (or finished) coroutine.
///
/// Named `Fut` rather than `Future` to avoid shadowing
/// `std::future::Future`, matching the source's own `Fut<T, E, REACTOR>`.
/// Move-only: dropping a `Fut` whose coroutine has not yet completed is a
/// programming error (debug builds assert it), since this runtime does not
/// support cancellation.
pub struct Fut<'r, T, E> {
    frame: NonNull<Link>,
    reactor: &'r Reactor<'r>,
    _marker: PhantomData<fn() -> Result<T, E>>,
}

impl<'r, T, E> Fut<'r, T, E> {
    fn header(&self) -> *mut Header<T, E> {
        self.frame.as_ptr() as *mut Header<T, E>
    }

    pub(crate) fn link(&self) -> *mut Link {
        self.frame.as_ptr()
    }

    pub(crate) fn try_take(&self) -> Option<Result<T, E>> {
        // SAFETY: `self.frame` always points at a live `Header<T, E>` for
        // the `T, E` this handle was spawned with.
        unsafe {
            let header = self.header();
            if (*header).completed.get() {
                (*header).result.replace(None)
            } else {
                None
            }
        }
    }

    pub(crate) fn register_waiting_parent(&self, parent: *mut Link) {
        unsafe { (*self.header()).waiting_parent.set(parent) };
    }

    /// Runs the reactor's event loop until this coroutine produces a
    /// value, consuming the handle.
    ///
    /// The returned error widens the coroutine's own error type `E` with a
    /// syscall failure surfaced while driving the loop on its behalf —
    /// the one call site the design notes name as `extend_error<E,
    /// SyscallError>`.
    pub fn block_on(self) -> Result<T, crate::error::Outcome<E>> {
        loop {
            if let Some(result) = self.try_take() {
                return result.map_err(crate::error::Outcome::Body);
            }
            if let Err(e) = self.reactor.run_once() {
                return Err(crate::error::Outcome::Reactor(e));
            }
        }
    }

    /// Like [`Self::block_on`], but once this coroutine has produced a
    /// value it keeps driving the reactor until `has_active_tasks()` goes
    /// false, rather than returning the moment this one frame resolves.
    ///
    /// This is the entry point a signal handler should use: a handler that
    /// returned as soon as its own coroutine finished could still leave
    /// sibling frames it spawned (or that a combinator like
    /// [`crate::combinators::when_all`] started) parked mid-await, with no
    /// further `run_once` ever coming to resume them — there is no second
    /// reactor turn once control returns to whatever the signal interrupted.
    /// Draining here trades a slightly longer handler for never leaving
    /// reactor-owned frames stranded.
    pub fn block_on_draining(self) -> Result<T, crate::error::Outcome<E>> {
        loop {
            if let Some(result) = self.try_take() {
                while self.reactor.has_active_tasks() {
                    if let Err(e) = self.reactor.run_once() {
                        return Err(crate::error::Outcome::Reactor(e));
                    }
                }
                return result.map_err(crate::error::Outcome::Body);
            }
            if let Err(e) = self.reactor.run_once() {
                return Err(crate::error::Outcome::Reactor(e));
            }
        }
    }
}

impl<T, E> std::future::Future for Fut<'_, T, E> {
    type Output = Result<T, E>;

    /// This impl only lets `try_take` be polled through the standard
    /// trait; it registers no waker. A coroutine that wants to be resumed
    /// when a child `Fut` completes awaits [`crate::combinators::Join`]
    /// instead, which uses `Cx` — not this impl — to register itself.
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.try_take() {
            Some(r) => Poll::Ready(r),
            None => Poll::Pending,
        }
    }
}

impl<T, E> Drop for Fut<'_, T, E> {
    fn drop(&mut self) {
        let completed = unsafe { (*self.header()).completed.get() };
        debug_assert!(
            completed,
            "Fut dropped while its coroutine was still suspended; this runtime has no cancellation"
        );
        let link = self.frame.as_ptr();
        let vtable = unsafe { (*link).vtable };
        unsafe { (vtable.drop_and_free)(link, self.reactor) };
    }
}
