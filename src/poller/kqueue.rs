use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

use super::MAX_EVENTS;

pub(crate) const CREATE_SYSCALL: &str = "kqueue";
pub(crate) const ADD_SYSCALL: &str = "kevent";
pub(crate) const WAIT_SYSCALL: &str = "kevent";

pub(crate) fn create() -> io::Result<RawFd> {
    let fd = unsafe { libc::kqueue() };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    Ok(fd)
}

/// Registers `fd` for write readiness. `EV_CLEAR` gives the edge-triggered
/// behavior matching the epoll registration: one notification per handshake
/// settlement.
pub(crate) fn add(poller: RawFd, fd: RawFd) -> io::Result<()> {
    let mut change: libc::kevent = unsafe { mem::zeroed() };
    change.ident = fd as libc::uintptr_t;
    change.filter = libc::EVFILT_WRITE;
    change.flags = libc::EV_ADD | libc::EV_CLEAR;
    let rc = unsafe {
        libc::kevent(poller, &change, 1, ptr::null_mut(), 0, ptr::null())
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Blocks up to `timeout_ms` and returns the descriptors that became ready.
pub(crate) fn wait(poller: RawFd, timeout_ms: i32) -> io::Result<Vec<RawFd>> {
    let timeout = libc::timespec {
        tv_sec: (timeout_ms / 1000) as libc::time_t,
        tv_nsec: (timeout_ms % 1000) as libc::c_long * 1_000_000,
    };
    let mut events: [libc::kevent; MAX_EVENTS] = unsafe { mem::zeroed() };
    let n = unsafe {
        libc::kevent(
            poller,
            ptr::null(),
            0,
            events.as_mut_ptr(),
            MAX_EVENTS as libc::c_int,
            &timeout,
        )
    };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(events[..n as usize].iter().map(|e| e.ident as RawFd).collect())
}
