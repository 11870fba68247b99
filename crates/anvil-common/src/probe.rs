//! Management-network reachability probing.
//!
//! The provisioning driver treats "the host answers on its management IP"
//! as the installation-complete signal. The probe sits behind a trait so
//! driver tests can script reachability instead of opening sockets.

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// Reachability check against a target host.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Returns true when the target accepts a TCP connection within
    /// `timeout`.
    async fn reachable(&self, addr: IpAddr, port: u16, timeout: Duration) -> bool;
}

/// Real TCP connect probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

#[async_trait]
impl HostProbe for TcpProbe {
    async fn reachable(&self, addr: IpAddr, port: u16, timeout: Duration) -> bool {
        let target = SocketAddr::new(addr, port);
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(target)).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_probe_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe;
        let up = probe
            .reachable(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                port,
                Duration::from_secs(1),
            )
            .await;
        assert!(up);
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable() {
        // Bind then drop so the port is known-closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpProbe;
        let up = probe
            .reachable(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                port,
                Duration::from_millis(200),
            )
            .await;
        assert!(!up);
    }
}
