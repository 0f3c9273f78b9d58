use std::net::SocketAddr;

use tokio::net::lookup_host;

use crate::error::CheckError;
use crate::options::Network;

/// Resolves `host:port` to a socket address honoring the family preference.
///
/// Resolution is delegated to the platform resolver and therefore counts
/// against the caller's probe deadline. With [`Network::Tcp`] an IPv4 address
/// wins when both families resolve.
pub async fn resolve(addr: &str, network: Network) -> Result<SocketAddr, CheckError> {
    let addrs: Vec<SocketAddr> = lookup_host(addr)
        .await
        .map_err(|e| CheckError::InvalidAddress(format!("{addr}: {e}")))?
        .collect();

    let resolved = match network {
        Network::Tcp => addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied(),
        Network::Tcp4 => addrs.iter().find(|a| a.is_ipv4()).copied(),
        Network::Tcp6 => addrs.iter().find(|a| a.is_ipv6()).copied(),
    };

    resolved.ok_or_else(|| {
        CheckError::InvalidAddress(format!("{addr}: no address for the requested family"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_port_and_family() {
        let addr = resolve("127.0.0.1:8080", Network::Tcp).await.unwrap();
        assert_eq!(addr.port(), 8080);
        assert!(addr.is_ipv4());

        let addr = resolve("[::1]:9000", Network::Tcp6).await.unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(addr.is_ipv6());
    }

    #[tokio::test]
    async fn rejects_family_mismatch() {
        let err = resolve("[::1]:80", Network::Tcp4).await.unwrap_err();
        assert!(matches!(err, CheckError::InvalidAddress(_)));

        let err = resolve("127.0.0.1:80", Network::Tcp6).await.unwrap_err();
        assert!(matches!(err, CheckError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn rejects_malformed_input() {
        assert!(matches!(
            resolve("no-port-here", Network::Tcp).await,
            Err(CheckError::InvalidAddress(_))
        ));
        assert!(matches!(
            resolve("256.1.1.1:80:80", Network::Tcp).await,
            Err(CheckError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn v6_literal_without_preference() {
        let addr = resolve("[::1]:443", Network::Tcp).await.unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 443);
    }
}
