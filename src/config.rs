use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::info;

/// Daemon-mode options. Everything shared with one-off mode stays on the
/// command line; this file only configures the sweep daemon itself.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Address the Prometheus scrape endpoint listens on.
    pub run_address: SocketAddr,
    /// Seconds between sweeps over all addresses.
    pub check_interval: u64,
    /// TCP addresses to check each sweep.
    pub tcp_addresses: Vec<String>,
}

pub async fn load(path: &Path) -> Result<DaemonConfig> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("could not open config file {}", path.display()))?;
    let config: DaemonConfig =
        serde_yaml::from_str(&raw).context("error parsing config file")?;

    if config.check_interval == 0 {
        bail!("check_interval must be at least one second");
    }
    if config.tcp_addresses.is_empty() {
        bail!("tcp_addresses must name at least one address");
    }
    // Surface unresolvable addresses at startup instead of every sweep.
    for addr in &config.tcp_addresses {
        tokio::net::lookup_host(addr.as_str())
            .await
            .with_context(|| format!("can not resolve '{addr}'"))?;
    }

    info!("parsed {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_temp(tag: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "synprobe-config-{tag}-{}.yaml",
            std::process::id()
        ));
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn parses_a_valid_file() {
        let path = write_temp(
            "valid",
            "run_address: 127.0.0.1:9100\ncheck_interval: 30\ntcp_addresses:\n  - 127.0.0.1:80\n",
        )
        .await;
        let config = load(&path).await.unwrap();
        assert_eq!(config.check_interval, 30);
        assert_eq!(config.tcp_addresses, vec!["127.0.0.1:80".to_string()]);
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn rejects_empty_target_list() {
        let path = write_temp(
            "empty",
            "run_address: 127.0.0.1:9100\ncheck_interval: 30\ntcp_addresses: []\n",
        )
        .await;
        assert!(load(&path).await.is_err());
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn rejects_missing_file() {
        assert!(load(Path::new("/definitely/not/here.yaml")).await.is_err());
    }
}
