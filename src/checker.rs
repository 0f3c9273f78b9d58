use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{error, info};

use crate::addr;
use crate::error::CheckError;
use crate::options::Options;
use crate::pipe::{PipePool, ResultPipe};
use crate::poller;
use crate::registry::ResultPipes;
use crate::socket::{self, ConnectStart, SockFd};

const NO_POLLER: RawFd = -1;

/// Shared half-open TCP probe engine.
///
/// One background poller loop ([`Checker::run`]) serves any number of
/// concurrent [`Checker::check`] callers. A probe sends SYN, waits for the
/// kernel to settle the handshake, and closes the socket with `SO_LINGER`
/// = 0 so the remote application never completes an accept.
pub struct Checker {
    /// The live poller descriptor, or [`NO_POLLER`]. Read atomically by
    /// probing callers; written only under `lifecycle`.
    poller_fd: AtomicI32,
    pipes: ResultPipes,
    pool: PipePool,
    zero_linger: bool,
    /// Serializes poller open/close. Held briefly, never across awaits.
    lifecycle: Mutex<()>,
    /// Readiness signal. Replaced with a fresh not-ready channel when a loop
    /// exits, so each loop lifetime signals ready exactly once.
    ready: Mutex<watch::Sender<bool>>,
}

impl Checker {
    /// Creates an idle checker that closes probe sockets with a RST.
    pub fn new() -> Self {
        Self::with_zero_linger(true)
    }

    /// Creates an idle checker with an explicit default for the zero-linger
    /// close. Per-probe [`Options`] override this.
    pub fn with_zero_linger(zero_linger: bool) -> Self {
        let (ready, _) = watch::channel(false);
        Checker {
            poller_fd: AtomicI32::new(NO_POLLER),
            pipes: ResultPipes::new(),
            pool: PipePool::new(),
            zero_linger,
            lifecycle: Mutex::new(()),
            ready: Mutex::new(ready),
        }
    }

    /// Drives the poller loop until `shutdown` fires or its sender drops.
    ///
    /// Returns `Ok(())` on clean shutdown and an error if the poller could
    /// not be created, another loop is already live on this checker, or a
    /// wait syscall failed fatally. After return the checker is idle again
    /// and `run` may be called anew.
    pub async fn run(&self, mut shutdown: watch::Receiver<()>) -> Result<(), CheckError> {
        self.open_poller()?;
        info!("handshake poller started");
        let result = self.poll_loop(&mut shutdown).await;
        self.close_poller();
        match &result {
            Ok(()) => info!("handshake poller stopped"),
            Err(err) => error!(%err, "handshake poller failed"),
        }
        result
    }

    /// True while the poller loop is live.
    pub fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap().borrow()
    }

    /// Completes once the poller loop is live. Callers racing engine startup
    /// park here instead of failing.
    pub async fn wait_ready(&self) {
        loop {
            let mut rx = self.ready.lock().unwrap().subscribe();
            if *rx.borrow() {
                return;
            }
            // Err means the loop exited and the signal was re-armed; retry
            // against the fresh channel.
            if rx.changed().await.is_ok() && *rx.borrow() {
                return;
            }
        }
    }

    /// Probes `addr` with this checker's default options and the given
    /// timeout.
    pub async fn check(&self, addr: &str, timeout: Duration) -> Result<(), CheckError> {
        let opts = Options::default()
            .with_timeout(timeout)
            .with_zero_linger(self.zero_linger);
        self.check_with_options(addr, &opts).await
    }

    /// Probes `addr`. `Ok(())` means the remote port answered the SYN; the
    /// errors are [`CheckError::Timeout`], [`CheckError::Connect`],
    /// [`CheckError::InvalidAddress`] and [`CheckError::Fatal`].
    ///
    /// Safe to call from many tasks concurrently against one shared checker.
    pub async fn check_with_options(
        &self,
        addr: &str,
        opts: &Options,
    ) -> Result<(), CheckError> {
        let deadline = Instant::now() + opts.timeout;

        // Startup race: park until the loop is live, still under the probe
        // deadline. Resolution also counts against the deadline.
        timeout_at(deadline, self.wait_ready())
            .await
            .map_err(|_| CheckError::Timeout)?;
        let remote = timeout_at(deadline, addr::resolve(addr, opts.network))
            .await
            .map_err(|_| CheckError::Timeout)??;

        let sock = socket::open_socket(&remote, opts.zero_linger, opts.mark)?;

        match socket::start_connect(sock.as_raw(), &remote)? {
            ConnectStart::Connected => return Ok(()),
            ConnectStart::InFlight => {}
        }
        if Instant::now() >= deadline {
            return Err(CheckError::Timeout);
        }

        let probe = Probe::begin(self, sock)?;
        // Tie-break prefers a delivered outcome over an expired deadline.
        tokio::select! {
            biased;
            outcome = probe.pipe.recv() => outcome,
            _ = sleep_until(deadline) => Err(CheckError::Timeout),
        }
    }

    fn open_poller(&self) -> Result<(), CheckError> {
        let _guard = self.lifecycle.lock().unwrap();
        if self.poller_fd.load(Ordering::Acquire) != NO_POLLER {
            return Err(CheckError::AlreadyStarted);
        }
        let fd = poller::create().map_err(|e| CheckError::fatal(poller::CREATE_SYSCALL, &e))?;
        self.poller_fd.store(fd, Ordering::Release);
        self.ready.lock().unwrap().send_replace(true);
        Ok(())
    }

    fn close_poller(&self) {
        let _guard = self.lifecycle.lock().unwrap();
        let fd = self.poller_fd.swap(NO_POLLER, Ordering::AcqRel);
        if fd != NO_POLLER {
            poller::close(fd);
        }
        let (fresh, _) = watch::channel(false);
        *self.ready.lock().unwrap() = fresh;
    }

    async fn poll_loop(&self, shutdown: &mut watch::Receiver<()>) -> Result<(), CheckError> {
        loop {
            let poller_fd = self.poller_fd.load(Ordering::Acquire);
            let waited =
                tokio::task::spawn_blocking(move || poller::wait(poller_fd, poller::WAIT_TIMEOUT_MS))
                    .await;
            let ready_fds = match waited {
                Ok(Ok(fds)) => fds,
                // Interrupted waits are retried, everything else is fatal.
                Ok(Err(err)) if err.raw_os_error() == Some(libc::EINTR) => Vec::new(),
                Ok(Err(err)) => return Err(CheckError::fatal(poller::WAIT_SYSCALL, &err)),
                Err(_) => {
                    return Err(CheckError::Fatal {
                        syscall: poller::WAIT_SYSCALL,
                        errno: 0,
                    })
                }
            };

            for fd in ready_fds {
                self.deliver(fd);
            }

            // Cancellation is observed between waits, at most one wait
            // timeout late. A dropped sender counts as cancellation.
            match shutdown.has_changed() {
                Ok(false) => {}
                _ => return Ok(()),
            }
        }
    }

    /// Settles one ready descriptor: classify its pending socket error and
    /// hand the outcome to whoever registered the fd.
    fn deliver(&self, fd: RawFd) {
        // No pipe means the probe deregistered on deadline expiry; the
        // event is stale and dropped.
        let Some(pipe) = self.pipes.pop(fd) else {
            return;
        };
        let outcome = match socket::take_socket_error(fd) {
            Ok(0) => Ok(()),
            Ok(errno) => Err(CheckError::Connect { errno }),
            Err(err) => Err(CheckError::fatal("getsockopt", &err)),
        };
        pipe.deliver(outcome);
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight probe state: the owned socket plus its registered result pipe.
///
/// Cleanup lives in `Drop` so the registry entry, the pooled pipe and the
/// socket are released on every exit path, including caller-task
/// cancellation and panic.
struct Probe<'a> {
    checker: &'a Checker,
    sock: SockFd,
    pipe: ResultPipe,
}

impl<'a> Probe<'a> {
    /// Registers the result pipe first, then hands the fd to the poller.
    /// The reverse order would let the loop observe readiness with no pipe
    /// to deliver into, silently dropping the outcome.
    fn begin(checker: &'a Checker, sock: SockFd) -> Result<Self, CheckError> {
        let fd = sock.as_raw();
        let pipe = checker.pool.get();
        checker.pipes.register(fd, pipe.clone());
        let probe = Probe { checker, sock, pipe };

        let poller_fd = checker.poller_fd.load(Ordering::Acquire);
        poller::add(poller_fd, fd).map_err(|e| CheckError::fatal(poller::ADD_SYSCALL, &e))?;
        Ok(probe)
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        // Deregister before the socket field drops and closes the fd, so a
        // recycled descriptor number can never reach a stale pipe.
        self.checker.pipes.deregister(self.sock.as_raw());
        self.checker.pool.put(self.pipe.clone());
    }
}
