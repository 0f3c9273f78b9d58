//! Plain-connect fallback for targets without a readiness poller.
//!
//! Completes the full handshake and closes immediately; the half-open
//! behavior of the POSIX engine is not reproducible here, only the
//! liveness answer is. `run` simply parks until cancelled so callers can
//! drive this checker exactly like the poller-backed one.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::addr;
use crate::error::CheckError;
use crate::options::Options;

pub struct Checker {
    zero_linger: bool,
}

impl Checker {
    pub fn new() -> Self {
        Self::with_zero_linger(true)
    }

    pub fn with_zero_linger(zero_linger: bool) -> Self {
        Checker { zero_linger }
    }

    /// Parks until `shutdown` fires or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<()>) -> Result<(), CheckError> {
        let _ = shutdown.changed().await;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        true
    }

    pub async fn wait_ready(&self) {}

    pub async fn check(&self, addr: &str, timeout: Duration) -> Result<(), CheckError> {
        let opts = Options::default()
            .with_timeout(timeout)
            .with_zero_linger(self.zero_linger);
        self.check_with_options(addr, &opts).await
    }

    pub async fn check_with_options(
        &self,
        addr: &str,
        opts: &Options,
    ) -> Result<(), CheckError> {
        let run = async {
            let remote = addr::resolve(addr, opts.network).await?;
            let stream = TcpStream::connect(remote).await.map_err(|err| {
                CheckError::Connect {
                    errno: err.raw_os_error().unwrap_or(0),
                }
            })?;
            if opts.zero_linger {
                // Best effort; the fallback has no RST guarantee to keep.
                let _ = stream.set_linger(Some(Duration::ZERO));
            }
            Ok(())
        };
        match timeout(opts.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(CheckError::Timeout),
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}
