use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use super::MAX_EVENTS;

pub(crate) const CREATE_SYSCALL: &str = "epoll_create1";
pub(crate) const ADD_SYSCALL: &str = "epoll_ctl";
pub(crate) const WAIT_SYSCALL: &str = "epoll_wait";

pub(crate) fn create() -> io::Result<RawFd> {
    let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Registers `fd` for edge-triggered writability (and readability, which
/// covers a peer that answers and immediately resets).
pub(crate) fn add(poller: RawFd, fd: RawFd) -> io::Result<()> {
    let mut event = libc::epoll_event {
        events: (libc::EPOLLOUT | libc::EPOLLIN | libc::EPOLLET) as u32,
        u64: fd as u64,
    };
    let rc = unsafe { libc::epoll_ctl(poller, libc::EPOLL_CTL_ADD, fd, &mut event) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Blocks up to `timeout_ms` and returns the descriptors that became ready.
pub(crate) fn wait(poller: RawFd, timeout_ms: i32) -> io::Result<Vec<RawFd>> {
    let mut events: [libc::epoll_event; MAX_EVENTS] = unsafe { mem::zeroed() };
    let n = unsafe {
        libc::epoll_wait(poller, events.as_mut_ptr(), MAX_EVENTS as i32, timeout_ms)
    };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(events[..n as usize].iter().map(|e| e.u64 as RawFd).collect())
}
