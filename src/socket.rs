use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::ptr;

use crate::error::CheckError;

/// Owned probing socket. Closed exactly once, on drop, so every probe exit
/// path including panic releases the descriptor.
#[derive(Debug)]
pub(crate) struct SockFd(RawFd);

impl SockFd {
    pub(crate) fn as_raw(&self) -> RawFd {
        self.0
    }
}

impl Drop for SockFd {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}

/// Immediate classification of a non-blocking `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectStart {
    /// The handshake completed synchronously.
    Connected,
    /// The handshake is in flight; wait for the poller.
    InFlight,
}

/// Creates a non-blocking close-on-exec stream socket for `addr`'s family,
/// with the handshake-suppression options applied.
pub(crate) fn open_socket(
    addr: &SocketAddr,
    zero_linger: bool,
    mark: u32,
) -> Result<SockFd, CheckError> {
    let family = if addr.is_ipv4() {
        libc::AF_INET
    } else {
        libc::AF_INET6
    };

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    let fd = {
        let fd = unsafe {
            libc::socket(
                family,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            return Err(CheckError::fatal("socket", &io::Error::last_os_error()));
        }
        SockFd(fd)
    };

    // macOS has no SOCK_NONBLOCK/SOCK_CLOEXEC; set both via fcntl.
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    let fd = {
        let fd = unsafe { libc::socket(family, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(CheckError::fatal("socket", &io::Error::last_os_error()));
        }
        let fd = SockFd(fd);
        let flags = unsafe { libc::fcntl(fd.as_raw(), libc::F_GETFL) };
        if flags < 0
            || unsafe { libc::fcntl(fd.as_raw(), libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0
            || unsafe { libc::fcntl(fd.as_raw(), libc::F_SETFD, libc::FD_CLOEXEC) } < 0
        {
            return Err(CheckError::fatal("fcntl", &io::Error::last_os_error()));
        }
        fd
    };

    // Delayed-ACK tuning exists only on Linux. Clearing it keeps the kernel
    // from volunteering ACKs on the probing side.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    set_opt(fd.as_raw(), libc::IPPROTO_TCP, libc::TCP_QUICKACK, 0i32)?;

    if zero_linger {
        // close(2) on a zero-linger socket sends RST, not FIN. The probed
        // application never completes an accept for this connection.
        let linger = libc::linger {
            l_onoff: 1,
            l_linger: 0,
        };
        set_opt(fd.as_raw(), libc::SOL_SOCKET, libc::SO_LINGER, linger)?;
    }

    // Firewall marking is Linux-only; elsewhere a requested mark is ignored.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    if mark != 0 {
        set_opt(fd.as_raw(), libc::SOL_SOCKET, libc::SO_MARK, mark)?;
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let _ = mark;

    Ok(fd)
}

fn set_opt<T>(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: T,
) -> Result<(), CheckError> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const T as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(CheckError::fatal("setsockopt", &io::Error::last_os_error()));
    }
    Ok(())
}

/// Issues the non-blocking `connect` and classifies the immediate return.
pub(crate) fn start_connect(fd: RawFd, addr: &SocketAddr) -> Result<ConnectStart, CheckError> {
    let (storage, len) = sockaddr_from(addr);
    let rc = unsafe {
        libc::connect(fd, &storage as *const _ as *const libc::sockaddr, len)
    };
    if rc == 0 {
        return Ok(ConnectStart::Connected);
    }
    match io::Error::last_os_error().raw_os_error().unwrap_or(0) {
        // Handshake under way; the poller will report the outcome.
        libc::EINPROGRESS | libc::EALREADY | libc::EINTR => Ok(ConnectStart::InFlight),
        libc::EISCONN => Ok(ConnectStart::Connected),
        // Solaris reports EINVAL when the server raced an accept+close
        // before we observed the handshake; writes would see EOF, so the
        // port was live. Matches the standard-library precedent.
        #[cfg(target_os = "solaris")]
        libc::EINVAL => Ok(ConnectStart::Connected),
        errno => Err(CheckError::Connect { errno }),
    }
}

/// Queries and clears the pending socket error (`SO_ERROR`).
pub(crate) fn take_socket_error(fd: RawFd) -> io::Result<i32> {
    let mut err: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(err)
}

fn sockaddr_from(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    match addr {
        SocketAddr::V4(v4) => {
            let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            // Octets are already network order; copy them through as-is.
            sin.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(v4.ip().octets()),
            };
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly"
            ))]
            {
                sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
            }
            unsafe {
                ptr::copy_nonoverlapping(
                    &sin as *const _ as *const u8,
                    &mut storage as *mut _ as *mut u8,
                    mem::size_of::<libc::sockaddr_in>(),
                );
            }
            (storage, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        }
        SocketAddr::V6(v6) => {
            let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_scope_id = v6.scope_id();
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly"
            ))]
            {
                sin6.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
            }
            unsafe {
                ptr::copy_nonoverlapping(
                    &sin6 as *const _ as *const u8,
                    &mut storage as *mut _ as *mut u8,
                    mem::size_of::<libc::sockaddr_in6>(),
                );
            }
            (storage, mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn factory_sets_nonblocking_and_cloexec() {
        let fd = open_socket(&loopback(), true, 0).unwrap();

        let fl = unsafe { libc::fcntl(fd.as_raw(), libc::F_GETFL) };
        assert!(fl >= 0);
        assert_ne!(fl & libc::O_NONBLOCK, 0);

        let fdflags = unsafe { libc::fcntl(fd.as_raw(), libc::F_GETFD) };
        assert!(fdflags >= 0);
        assert_ne!(fdflags & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn factory_applies_zero_linger() {
        let fd = open_socket(&loopback(), true, 0).unwrap();

        let mut linger: libc::linger = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::linger>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd.as_raw(),
                libc::SOL_SOCKET,
                libc::SO_LINGER,
                &mut linger as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        assert_eq!(rc, 0);
        assert_ne!(linger.l_onoff, 0);
        assert_eq!(linger.l_linger, 0);
    }

    #[test]
    fn socket_error_starts_clear() {
        let fd = open_socket(&loopback(), false, 0).unwrap();
        assert_eq!(take_socket_error(fd.as_raw()).unwrap(), 0);
    }
}
