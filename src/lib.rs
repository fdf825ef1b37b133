//! A small, embeddable, async-signal-safe coroutine runtime.
//!
//! Every coroutine frame lives in one fixed-size arena handed to
//! [`reactor::Reactor::new`] by the caller — nothing in this crate calls
//! the global allocator. That, plus the reactor's single-threaded,
//! non-reentrant event loop, is what makes it sound to drive a coroutine
//! to completion from inside a signal handler (see [`sighandler`]).
//!
//! Start at [`reactor::Reactor::spawn`], which admits any `async fn(Cx<'r>,
//! ..) -> Result<T, E>` as a coroutine body, and [`future::Fut::block_on`],
//! which drives one to completion. The [`prelude`] re-exports the pieces
//! most programs need.

pub mod alloc;
pub mod awaitables;
pub mod clock;
pub mod combinators;
pub mod cx;
pub mod error;
pub mod future;
pub mod io;
pub(crate) mod list;
pub mod reactor;
pub mod sighandler;
pub(crate) mod waker;

pub mod prelude {
    #[doc(hidden)]
    pub use crate::awaitables::{Join, PollEvent, Sleep, Yield};
    #[doc(hidden)]
    pub use crate::combinators::{Holder, Semaphore};
    #[doc(hidden)]
    pub use crate::cx::Cx;
    #[doc(hidden)]
    pub use crate::error::{AllocError, Error, IoError, Outcome, SyscallError, Void};
    #[doc(hidden)]
    pub use crate::future::Fut;
    #[doc(hidden)]
    pub use crate::reactor::Reactor;
    #[doc(hidden)]
    pub use crate::{try_co, when_all, when_all_succeed};
}

// End-to-end scenarios (pure computation, yield-then-return, allocation
// failure, pipe round-trip, sleep, bounded parallelism) live in
// `tests/scenarios.rs` as integration tests against the public API; each
// module above carries its own `#[cfg(test)]` unit tests for its
// module-local invariants instead of duplicating them here.
