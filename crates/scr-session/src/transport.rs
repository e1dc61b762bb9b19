//! Datagram transport.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, info};

use crate::error::TransportError;

/// Receive buffer size; comfortably above the largest SCR telemetry message.
pub const DEFAULT_RECV_BUFFER: usize = 4096;

/// Unreliable, unordered datagram channel to the race server.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next datagram, at most `timeout`.
    ///
    /// Returns [`TransportError::Timeout`] when nothing arrived in time.
    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Unconnected UDP socket talking to a single server address.
///
/// Datagrams from any other peer are dropped. The socket is never
/// `connect`ed, so ICMP port-unreachable replies do not surface as receive
/// errors while the server is down.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Resolve `host` and bind an ephemeral local port of the same family.
    ///
    /// IPv4 addresses are preferred when the name resolves to both families.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();
        let server = addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| TransportError::Resolve {
                host: host.to_string(),
            })?;

        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        info!(%server, local = %socket.local_addr()?, "UDP transport ready");

        Ok(Self {
            socket,
            server,
            buf: vec![0; DEFAULT_RECV_BUFFER],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.server
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(payload, self.server).await?;
        if sent < payload.len() {
            debug!(sent, len = payload.len(), "Short UDP send");
        }
        Ok(())
    }

    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let server = self.server;
        let Self { socket, buf, .. } = self;
        let receive = async {
            loop {
                let (len, from) = socket.recv_from(buf.as_mut_slice()).await?;
                if from == server {
                    return Ok::<_, std::io::Error>(len);
                }
                debug!(%from, "Ignoring datagram from unexpected peer");
            }
        };

        let result = tokio::time::timeout(timeout, receive).await;
        match result {
            Ok(Ok(len)) => Ok(buf.get(..len).map(<[u8]>::to_vec).unwrap_or_default()),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_elapsed) => Err(TransportError::Timeout),
        }
    }
}
