//! Half-open TCP liveness checks.
//!
//! A probe performs the TCP handshake only up to SYN → SYN-ACK and then
//! aborts with a RST: the remote kernel has confirmed the port is open,
//! while the listening application typically never sees a connection come
//! and go. Compared with connect-and-close health checking this costs
//! fewer packets and never leaves "client connected then disappeared"
//! noise in the probed server's logs. HAProxy checks upstreams the same
//! way.
//!
//! On Linux and the BSDs one background poller loop (epoll / kqueue)
//! multiplexes the non-blocking connects of every concurrent caller:
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio::sync::watch;
//!
//! # async fn demo() -> Result<(), synprobe::CheckError> {
//! let checker = std::sync::Arc::new(synprobe::Checker::new());
//!
//! let (stop, stop_rx) = watch::channel(());
//! let looper = checker.clone();
//! tokio::spawn(async move { looper.run(stop_rx).await });
//! checker.wait_ready().await;
//!
//! checker.check("example.com:80", Duration::from_secs(1)).await?;
//! drop(stop);
//! # Ok(())
//! # }
//! ```
//!
//! [`default_checker`] wraps the common case of one shared, signal-scoped
//! engine per process.

mod addr;
mod default;
mod error;
mod options;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod checker;
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod pipe;
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod poller;
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod registry;
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod socket;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
mod fallback;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub use checker::Checker;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
pub use fallback::Checker;

pub use default::{default_checker, shutdown_on_signal};
pub use error::CheckError;
pub use options::{Network, Options};
