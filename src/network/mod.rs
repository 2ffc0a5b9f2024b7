//! Network side of the bridge
//!
//! [`session`] owns the UDP socket and its receive loop. [`local_ip`] finds
//! the address the operator has to enter in the sender app.

pub mod session;

pub use session::{SessionError, SessionEvent, SessionState, UdpSession, DEFAULT_PORT};

use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;
use tracing::debug;

/// LAN address of this machine
///
/// Connecting a UDP socket picks the outgoing interface without sending
/// anything. Falls back to loopback when no route exists.
pub async fn local_ip() -> IpAddr {
    match discover_local_ip().await {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Local address discovery failed: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn discover_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_ip_is_never_unspecified() {
        let ip = local_ip().await;
        assert!(!ip.is_unspecified());
    }
}
