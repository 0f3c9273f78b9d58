mod bulk;
mod cli;
mod config;
mod metrics;
mod scheduler;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use synprobe::{shutdown_on_signal, Checker, Options};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("synprobe={level}").parse()?),
        )
        .init();

    let opts = Options::default()
        .with_timeout(Duration::from_millis(args.timeout_ms))
        .with_network(args.network);

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(shutdown_on_signal(shutdown_tx));

    // One shared checking loop serves every probe this process makes.
    let checker = Arc::new(Checker::new());
    let (stop_tx, stop_rx) = watch::channel(());
    let loop_checker = checker.clone();
    let mut loop_task = tokio::spawn(async move { loop_checker.run(stop_rx).await });

    tokio::select! {
        _ = checker.wait_ready() => {}
        joined = &mut loop_task => {
            joined
                .context("checking loop panicked")?
                .context("initializing the checking loop failed")?;
            bail!("checking loop exited before becoming ready");
        }
    }

    match &args.config {
        Some(path) => {
            let config = config::load(path).await?;
            info!(
                addr = %config.run_address,
                "starting metrics endpoint, metrics will be available at /metrics"
            );
            tokio::spawn(metrics::serve_metrics(config.run_address));
            scheduler::run(
                checker.clone(),
                &config,
                &opts,
                args.requests,
                args.concurrency,
                shutdown_rx.clone(),
            )
            .await;
        }
        None => {
            info!(
                "checking {} with timeout {}ms, {} requests, concurrency {}",
                args.addr, args.timeout_ms, args.requests, args.concurrency
            );
            let started = tokio::time::Instant::now();
            let mut shutdown = shutdown_rx.clone();
            tokio::select! {
                tally = bulk::sweep(
                    checker.clone(),
                    &args.addr,
                    &opts,
                    args.requests,
                    args.concurrency,
                ) => {
                    info!(
                        "finished {}/{} checks in {:?}",
                        tally.requests.load(Ordering::Relaxed),
                        args.requests,
                        started.elapsed()
                    );
                    info!("  succeed: {}", tally.succeeded.load(Ordering::Relaxed));
                    info!(
                        "  errors: connect {}, timeout {}, other {}",
                        tally.connect_errors.load(Ordering::Relaxed),
                        tally.timeouts.load(Ordering::Relaxed),
                        tally.other_errors.load(Ordering::Relaxed)
                    );
                }
                _ = shutdown.changed() => {
                    info!("interrupted, canceling checking loop");
                }
            }
        }
    }

    let _ = stop_tx.send(());
    let _ = loop_task.await;
    Ok(())
}
