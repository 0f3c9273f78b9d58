use std::sync::Arc;

use tokio::sync::{watch, OnceCell};
use tracing::error;

use crate::Checker;

static DEFAULT_CHECKER: OnceCell<Arc<Checker>> = OnceCell::const_new();

/// Process-wide shared [`Checker`].
///
/// The first call constructs the checker, spawns its poller loop scoped to
/// the standard termination signals (SIGINT, SIGTERM) and waits for
/// readiness; later calls return the same instance. Construction is
/// serialized, so concurrent first calls observe one checker.
pub async fn default_checker() -> Arc<Checker> {
    DEFAULT_CHECKER.get_or_init(init).await.clone()
}

async fn init() -> Arc<Checker> {
    let checker = Arc::new(Checker::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(shutdown_on_signal(shutdown_tx));

    let loop_checker = checker.clone();
    tokio::spawn(async move {
        if let Err(err) = loop_checker.run(shutdown_rx).await {
            error!(%err, "default checker loop stopped");
        }
    });

    checker.wait_ready().await;
    checker
}

/// Sends on `shutdown` once the process receives SIGINT or SIGTERM.
///
/// Scopes the default checker's loop, and is reusable for any other
/// engine a caller wants tied to process termination.
pub async fn shutdown_on_signal(shutdown: watch::Sender<()>) {
    wait_for_termination().await;
    let _ = shutdown.send(());
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            // No SIGTERM handler; the interrupt still ends the scope.
            Err(err) => {
                error!(%err, "installing SIGTERM handler failed");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
