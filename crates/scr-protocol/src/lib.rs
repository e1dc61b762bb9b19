//! Simulated Car Racing (SCR) text protocol.
//!
//! The SCR server speaks a whitespace/parenthesis delimited text format over UDP:
//! every datagram is a run of groups `(key v1 v2 ... vn)` with no separator between
//! groups. Values are decimal numbers or the sentinel `-` ("unknown this tick").
//!
//! This crate provides:
//! - [`codec`] - group extraction and command/handshake encoding
//! - [`frame`] - the decoded sensor snapshot ([`TelemetryFrame`])
//! - [`command`] - the actuator snapshot sent back to the server ([`ControlCommand`])
//! - [`handshake`] - identification markers and the rangefinder init message
//!
//! # Example
//!
//! ```
//! use racing_wheel_scr_protocol::{decode, decode_frame};
//!
//! let message = decode("(angle 0.1)(rpm 3000)");
//! let frame = decode_frame(&message)?;
//! assert!((frame.rpm - 3000.0).abs() < f64::EPSILON);
//! # Ok::<(), racing_wheel_scr_protocol::DecodeError>(())
//! ```

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod handshake;

pub use codec::{UNKNOWN_VALUE, WireMessage, decode, encode, encode_init, encode_meta};
pub use command::{ControlCommand, GEAR_MAX, GEAR_MIN, META_CONTINUE, META_RESTART};
pub use error::DecodeError;
pub use frame::{
    DecodedFrame, FOCUS_LEN, OPPONENTS_LEN, TRACK_LEN, TelemetryFrame, WHEEL_SPIN_LEN,
    decode_frame, decode_frame_lossy,
};
pub use handshake::{
    IDENTIFIED_MARKER, RANGEFINDER_COUNT, RESTART_MARKER, SHUTDOWN_MARKER, ServerEvent,
    default_rangefinder_angles, handshake_message,
};
