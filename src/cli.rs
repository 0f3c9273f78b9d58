use std::path::PathBuf;

use clap::Parser;
use synprobe::Network;

/// Half-open TCP liveness checker: SYN, SYN-ACK, RST.
#[derive(Parser, Debug)]
#[command(name = "synprobe", version)]
pub struct Cli {
    /// TCP address to test.
    #[arg(short = 'a', long = "addr", default_value = "google.com:80")]
    pub addr: String,

    /// Timeout in milliseconds for the whole checking process, domain
    /// resolution included.
    #[arg(short = 't', long = "timeout-ms", default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Number of requests to perform.
    #[arg(short = 'n', long = "requests", default_value_t = 1)]
    pub requests: usize,

    /// Number of checks to perform simultaneously.
    #[arg(short = 'c', long = "concurrency", default_value_t = 1)]
    pub concurrency: usize,

    /// Print more logs, e.g. per-probe error detail.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Address family preference: tcp, tcp4 or tcp6.
    #[arg(long = "network", default_value = "tcp")]
    pub network: Network,

    /// Daemon mode: YAML config with addresses to sweep periodically while
    /// serving Prometheus metrics.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}
