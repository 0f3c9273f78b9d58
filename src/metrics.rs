use std::net::SocketAddr;

use once_cell::sync::Lazy;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;
use warp::Filter;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static SWEEP_DURATION: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new(
        "tcpcheck_duration_milliseconds",
        "Duration of the last check sweep in milliseconds, partitioned by destination and requests per sweep",
    );
    let gauge = GaugeVec::new(opts, &["destination", "requests_per_check"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static ERROR_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "tcpcheck_errors_total",
        "Number of check errors, partitioned by error type, destination and requests per sweep",
    );
    let counter =
        IntCounterVec::new(opts, &["error_type", "destination", "requests_per_check"]).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Renders the registry in the Prometheus text exposition format. A scrape
/// that fails to encode yields an empty page rather than a dead endpoint.
fn render() -> String {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_else(|err| {
            error!(%err, "encoding metrics failed");
            String::new()
        })
}

pub async fn serve_metrics(addr: SocketAddr) {
    let route = warp::path!("metrics")
        .map(|| warp::reply::with_header(render(), "Content-Type", prometheus::TEXT_FORMAT));
    warp::serve(route).run(addr).await;
}

pub fn observe_sweep(destination: &str, requests: usize, duration_ms: f64) {
    SWEEP_DURATION
        .with_label_values(&[destination, &requests.to_string()])
        .set(duration_ms);
}

pub fn add_errors(error_type: &str, destination: &str, requests: usize, count: u64) {
    ERROR_COUNT
        .with_label_values(&[error_type, destination, &requests.to_string()])
        .inc_by(count);
}
