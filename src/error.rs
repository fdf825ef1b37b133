//! The runtime's error algebra.
//!
//! Every fallible operation in this crate returns a `Result<T, E>` where `E`
//! is either a bare leaf error (`AllocError`, `SyscallError`) or an
//! [`Error`] composing a leaf error with a caller-supplied one. There is no
//! general variadic union — see `SPEC_FULL.md` §1 for why a fixed arity is
//! the idiomatic substitute here.

use std::any::TypeId;
use std::fmt;

/// An uninhabited marker used to fill an unused slot of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Void {}

impl fmt::Display for Void {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for Void {}

/// Raised when the [`crate::alloc::Allocator`] has no block large enough
/// to satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocator has no block large enough for this request")
    }
}

impl std::error::Error for AllocError {}

/// Wraps a raw OS error code (`errno`), as produced by a failed syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallError {
    code: i32,
}

impl SyscallError {
    /// Captures the current thread's `errno` as reported by libc.
    pub fn last_os_error() -> Self {
        Self {
            code: std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(0),
        }
    }

    /// Wraps an already-known raw error code.
    pub fn from_raw(code: i32) -> Self {
        Self { code }
    }

    /// The raw `errno` value this error carries.
    pub fn raw_os_error(&self) -> i32 {
        self.code
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::io::Error::from_raw_os_error(self.code))
    }
}

impl std::error::Error for SyscallError {}

/// A closed, fixed-arity error union.
///
/// `Alloc` and `Syscall` are the two alternatives the runtime itself ever
/// produces. `User` and `Other` are reserved for a coroutine body's own
/// error type(s); most call sites only ever need one (`Other` defaults to
/// [`Void`], so `Error<MyError>` reads naturally). [`crate::io`] operations
/// that cannot fail with a caller-defined error use `Error<Void, Void>`,
/// aliased as [`IoError`].
#[derive(Debug)]
pub enum Error<C = Void, D = Void> {
    Alloc(AllocError),
    Syscall(SyscallError),
    User(C),
    Other(D),
}

/// `Error<Void, Void>` — the alternative set produced by [`crate::io`]
/// operations and the reactor itself, with no caller-defined error type.
pub type IoError = Error<Void, Void>;

impl<C, D> Error<C, D> {
    pub fn user(value: C) -> Self {
        Error::User(value)
    }

    pub fn other(value: D) -> Self {
        Error::Other(value)
    }
}

impl<C, D> From<AllocError> for Error<C, D> {
    fn from(e: AllocError) -> Self {
        Error::Alloc(e)
    }
}

impl<C, D> From<SyscallError> for Error<C, D> {
    fn from(e: SyscallError) -> Self {
        Error::Syscall(e)
    }
}

impl<C: 'static, D: 'static> Error<C, D> {
    /// Reports whether this error's live variant carries a value of type
    /// `X`. Mirrors the source's `Error::holds<T>()`.
    pub fn holds<X: 'static>(&self) -> bool {
        let wanted = TypeId::of::<X>();
        match self {
            Error::Alloc(_) => wanted == TypeId::of::<AllocError>(),
            Error::Syscall(_) => wanted == TypeId::of::<SyscallError>(),
            Error::User(_) => wanted == TypeId::of::<C>(),
            Error::Other(_) => wanted == TypeId::of::<D>(),
        }
    }
}

impl<C, D> Error<C, D> {
    /// Exhaustive, compiler-checked dispatch over the four alternatives:
    /// one callback per variant, each given a reference to its payload.
    /// Where `holds`/`downcast`-style access is a narrow-contract escape
    /// hatch for a caller who already knows which alternative is live,
    /// `visit` is the total counterpart — adding a fifth alternative to
    /// `Error` would fail to compile every call site until it supplied a
    /// new callback, the same guarantee a `match` on the enum itself gives.
    pub fn visit<R>(
        &self,
        on_alloc: impl FnOnce(&AllocError) -> R,
        on_syscall: impl FnOnce(&SyscallError) -> R,
        on_user: impl FnOnce(&C) -> R,
        on_other: impl FnOnce(&D) -> R,
    ) -> R {
        match self {
            Error::Alloc(e) => on_alloc(e),
            Error::Syscall(e) => on_syscall(e),
            Error::User(e) => on_user(e),
            Error::Other(e) => on_other(e),
        }
    }
}

impl<C: fmt::Display, D: fmt::Display> fmt::Display for Error<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Alloc(e) => e.fmt(f),
            Error::Syscall(e) => e.fmt(f),
            Error::User(e) => e.fmt(f),
            Error::Other(e) => e.fmt(f),
        }
    }
}

impl<C: fmt::Debug + fmt::Display, D: fmt::Debug + fmt::Display> std::error::Error
    for Error<C, D>
{
}

/// The outward-facing error type of [`crate::future::Future::block_on`]:
/// either the coroutine body's own error, or a syscall failure surfaced by
/// the reactor while draining the event loop on its behalf. This is the one
/// call site `spec.md` names as `extend_error<E, SyscallError>`; rather than
/// folding a caller's arbitrary `E` into the fixed-arity `Error` enum (which
/// would require `E` to itself already be one), it gets its own small
/// two-variant union.
#[derive(Debug)]
pub enum Outcome<E> {
    Body(E),
    Reactor(SyscallError),
}

impl<E: fmt::Display> fmt::Display for Outcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Body(e) => e.fmt(f),
            Outcome::Reactor(e) => e.fmt(f),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Outcome<E> {}

/// Unwraps a `Result`, widening its error into the caller's return type via
/// `From` and returning early on failure. A thin, explicitly-named cousin of
/// `?`, kept for parity with the source's `TRY(expr)` convenience macro.
#[macro_export]
macro_rules! try_co {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return Err(::std::convert::From::from(err)),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_from_leaf_errors() {
        let a: Error<i32, Void> = AllocError.into();
        assert!(a.holds::<AllocError>());

        let s: Error<i32, Void> = SyscallError::from_raw(2).into();
        assert!(s.holds::<SyscallError>());
    }

    #[test]
    fn holds_distinguishes_user_slot() {
        let e: Error<&'static str, Void> = Error::user("boom");
        assert!(e.holds::<&'static str>());
        assert!(!e.holds::<AllocError>());
    }

    #[test]
    fn display_delegates_to_live_variant() {
        let e: Error<&'static str, Void> = Error::user("boom");
        assert_eq!(e.to_string(), "boom");
    }

    #[test]
    fn visit_dispatches_to_the_live_alternative_only() {
        let e: Error<&'static str, Void> = Error::user("boom");
        let seen = e.visit(
            |_| "alloc",
            |_| "syscall",
            |s| *s,
            |_| "other",
        );
        assert_eq!(seen, "boom");

        let e: Error<&'static str, Void> = AllocError.into();
        let seen = e.visit(|_| "alloc", |_| "syscall", |_| "user", |_| "other");
        assert_eq!(seen, "alloc");
    }
}
