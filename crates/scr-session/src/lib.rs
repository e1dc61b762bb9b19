//! Session protocol engine for the SCR client.
//!
//! [`SessionEngine`] owns one connection to the race server. It performs the
//! rangefinder handshake, answers every telemetry datagram with exactly one
//! command, counts episodes and stops once the server shuts the race down or the
//! configured episode budget is spent.
//!
//! The network sits behind the [`Transport`] trait; [`UdpTransport`] is the
//! production implementation and tests substitute a scripted one.

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod engine;
pub mod error;
pub mod observer;
pub mod transport;

pub use engine::{EpisodeCounter, SessionConfig, SessionEngine, SessionState, SessionSummary};
pub use error::{SessionError, TransportError};
pub use observer::{NoopObserver, TickObserver, TracingObserver};
pub use transport::{DEFAULT_RECV_BUFFER, Transport, UdpTransport};
