use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use synprobe::{CheckError, Checker, Options};

/// Outcome tallies for one bulk sweep.
#[derive(Debug, Default)]
pub struct Tally {
    pub requests: AtomicU64,
    pub succeeded: AtomicU64,
    pub connect_errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub other_errors: AtomicU64,
}

impl Tally {
    fn record(&self, addr: &str, result: Result<(), CheckError>) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(()) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(CheckError::Timeout) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(err @ CheckError::Connect { .. }) => {
                debug!(%addr, %err, "check failed");
                self.connect_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                debug!(%addr, %err, "check failed");
                self.other_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Performs `requests` checks of `addr` against one shared checker, at most
/// `concurrency` in flight at a time. Per-probe failures are tallied, never
/// escalated.
pub async fn sweep(
    checker: Arc<Checker>,
    addr: &str,
    opts: &Options,
    requests: usize,
    concurrency: usize,
) -> Arc<Tally> {
    let tally = Arc::new(Tally::default());
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut workers = Vec::with_capacity(requests);
    for _ in 0..requests {
        let permits = permits.clone();
        let checker = checker.clone();
        let tally = tally.clone();
        let addr = addr.to_string();
        let opts = opts.clone();
        workers.push(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = checker.check_with_options(&addr, &opts).await;
            tally.record(&addr, result);
        }));
    }
    for worker in workers {
        let _ = worker.await;
    }
    tally
}
