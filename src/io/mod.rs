//! Non-blocking I/O collaborators built on the reactor's `PollEvent`.
//!
//! `spec.md` specifies this surface only by contract (open/read/write
//! semantics, partial-progress rules). The concrete types below are
//! supplemented from the original source's concrete I/O facade
//! (`examples/original_source/include/corosig/io/{File,Pipe,TcpSocket,
//! UdpSocket}.hpp`), which the distilled spec dropped as "collaborators".
//! Every type shares the same `try_*_some` / `*_some` / `*` pattern,
//! mirrored from `src/io/posix/FdOps.{hpp,cpp}`: `try_*_some` calls the
//! syscall once and classifies `EAGAIN`/`EWOULDBLOCK` as "not ready"
//! rather than an error; `*_some` awaits one `PollEvent` then retries;
//! the plain (no suffix) operation loops `*_some` to fill/drain a whole
//! buffer, returning partial progress if an error arrives after the first
//! successful byte.

pub(crate) mod posix;

mod file;
mod pipe;
mod tcp;
mod udp;

pub use file::{File, OpenFlags};
pub use pipe::{PipePair, PipeRead, PipeWrite};
pub use tcp::{TcpListener, TcpSocket};
pub use udp::UdpSocket;
