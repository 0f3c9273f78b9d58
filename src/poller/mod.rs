//! Thin readiness-poller layer: epoll on Linux, kqueue on the BSDs.
//!
//! The engine owns exactly one poller descriptor at a time and is the only
//! caller of `create`/`close`; `add` is invoked by probing callers and
//! `wait` by the single loop task. Registration is edge-triggered, so each
//! probed descriptor produces at most one useful notification.

use std::os::unix::io::RawFd;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use epoll::{add, create, wait, ADD_SYSCALL, CREATE_SYSCALL, WAIT_SYSCALL};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod kqueue;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub(crate) use kqueue::{add, create, wait, ADD_SYSCALL, CREATE_SYSCALL, WAIT_SYSCALL};

/// Most descriptors reported per wait round.
pub(crate) const MAX_EVENTS: usize = 32;

/// Upper bound on one blocking wait. Engine cancellation is observed between
/// waits, so this also bounds shutdown latency.
pub(crate) const WAIT_TIMEOUT_MS: i32 = 1000;

pub(crate) fn close(poller: RawFd) {
    unsafe { libc::close(poller) };
}
