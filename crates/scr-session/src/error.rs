//! Session and transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// No datagram arrived within the receive timeout. Expected and retried.
    #[error("receive timed out")]
    Timeout,
    #[error("could not resolve server address {host}")]
    Resolve { host: String },
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport can no longer deliver datagrams.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Conditions that stop a session before the server ends it.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to send datagram to server: {0}")]
    Send(#[source] TransportError),
    #[error("transport closed by peer")]
    TransportClosed,
}
