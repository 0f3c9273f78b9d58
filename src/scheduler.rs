use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use synprobe::{Checker, Options};

use crate::bulk;
use crate::config::DaemonConfig;
use crate::metrics;

/// Sweeps every configured address once per interval and records the
/// results as Prometheus metrics. A tick that fires while the previous
/// sweep is still running is delayed, not overlapped.
pub async fn run(
    checker: Arc<Checker>,
    config: &DaemonConfig,
    opts: &Options,
    requests: usize,
    concurrency: usize,
    mut shutdown: watch::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(config.check_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("stopping sweep scheduler");
                return;
            }
            _ = ticker.tick() => {}
        }

        for addr in &config.tcp_addresses {
            debug!(%addr, "running sweep");
            let started = Instant::now();
            let tally = bulk::sweep(checker.clone(), addr, opts, requests, concurrency).await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            metrics::observe_sweep(addr, requests, duration_ms);
            metrics::add_errors(
                "connect",
                addr,
                requests,
                tally.connect_errors.load(Ordering::Relaxed),
            );
            metrics::add_errors(
                "timeout",
                addr,
                requests,
                tally.timeouts.load(Ordering::Relaxed),
            );
            metrics::add_errors(
                "other",
                addr,
                requests,
                tally.other_errors.load(Ordering::Relaxed),
            );

            info!(
                %addr,
                finished = tally.requests.load(Ordering::Relaxed),
                succeeded = tally.succeeded.load(Ordering::Relaxed),
                duration_ms,
                "sweep done"
            );
        }
    }
}
