use std::str::FromStr;
use std::time::Duration;

use crate::error::CheckError;

/// Address family preference for resolution and the probing socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Either family; IPv4 preferred when both resolve.
    #[default]
    Tcp,
    /// IPv4 only.
    Tcp4,
    /// IPv6 only.
    Tcp6,
}

impl FromStr for Network {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(CheckError::InvalidAddress(format!(
                "unknown network {other:?}, expected tcp, tcp4 or tcp6"
            ))),
        }
    }
}

/// Per-probe configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Upper bound for the whole probe, address resolution included.
    pub timeout: Duration,
    /// Address family preference.
    pub network: Network,
    /// Close the socket with `SO_LINGER` = 0 so the kernel emits a RST
    /// instead of a FIN, keeping the probed application from ever seeing
    /// an accepted connection.
    pub zero_linger: bool,
    /// `SO_MARK` value (Linux). Zero leaves the socket unmarked; non-zero
    /// usually needs `CAP_NET_ADMIN`.
    pub mark: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            timeout: Duration::from_secs(3),
            network: Network::Tcp,
            zero_linger: true,
            mark: 0,
        }
    }
}

impl Options {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_zero_linger(mut self, zero_linger: bool) -> Self {
        self.zero_linger = zero_linger;
        self
    }

    pub fn with_mark(mut self, mark: u32) -> Self {
        self.mark = mark;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert_eq!(opts.network, Network::Tcp);
        assert!(opts.zero_linger);
        assert_eq!(opts.mark, 0);
    }

    #[test]
    fn builders_chain() {
        let opts = Options::default()
            .with_timeout(Duration::from_millis(250))
            .with_network(Network::Tcp6)
            .with_zero_linger(false)
            .with_mark(7);
        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.network, Network::Tcp6);
        assert!(!opts.zero_linger);
        assert_eq!(opts.mark, 7);
    }

    #[test]
    fn network_from_str() {
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert_eq!("tcp4".parse::<Network>().unwrap(), Network::Tcp4);
        assert_eq!("tcp6".parse::<Network>().unwrap(), Network::Tcp6);
        assert!("udp".parse::<Network>().is_err());
    }
}
