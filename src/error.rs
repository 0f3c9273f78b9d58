use std::io;

use thiserror::Error;

/// Terminal outcome of a single probe or of the poller loop.
///
/// Probes never retry internally; a caller that wants a retry calls
/// [`Checker::check`](crate::Checker::check) again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The probe deadline elapsed before the handshake settled.
    #[error("i/o timeout")]
    Timeout,

    /// The handshake got a hard error from the kernel, e.g. `ECONNREFUSED`
    /// or `EHOSTUNREACH`. The errno is preserved verbatim.
    #[error("connect failed: {}", errno_message(.errno))]
    Connect { errno: i32 },

    /// The address could not be resolved, or resolution produced no address
    /// of the requested family.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// `run` was called while another poller loop was live on this checker.
    #[error("checking loop already started")]
    AlreadyStarted,

    /// A syscall the engine depends on failed.
    #[error("{syscall}: {}", errno_message(.errno))]
    Fatal { syscall: &'static str, errno: i32 },
}

fn errno_message(errno: &i32) -> io::Error {
    io::Error::from_raw_os_error(*errno)
}

impl CheckError {
    pub(crate) fn fatal(syscall: &'static str, err: &io::Error) -> Self {
        CheckError::Fatal {
            syscall,
            errno: err.raw_os_error().unwrap_or(0),
        }
    }

    /// The raw connect errno, if this is a handshake failure.
    pub fn connect_errno(&self) -> Option<i32> {
        match self {
            CheckError::Connect { errno } => Some(*errno),
            _ => None,
        }
    }

    /// True when the probe failed only by running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CheckError::Timeout)
    }
}
