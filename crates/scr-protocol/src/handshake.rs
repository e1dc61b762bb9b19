//! Session markers and the rangefinder handshake.

use crate::codec::encode_init;

/// Marker the server sends once the client's init message was accepted.
pub const IDENTIFIED_MARKER: &str = "***identified***";
/// Marker the server sends when the whole race is over.
pub const SHUTDOWN_MARKER: &str = "***shutdown***";
/// Marker the server sends when the current episode ends and a new one starts.
pub const RESTART_MARKER: &str = "***restart***";

/// Number of track rangefinders configured during the handshake.
pub const RANGEFINDER_COUNT: usize = 19;

/// Classification of an inbound datagram.
///
/// Markers are matched as substrings, not whole-message equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    Identified,
    Shutdown,
    Restart,
    /// Anything else: a telemetry message (possibly empty or malformed).
    Telemetry,
}

impl ServerEvent {
    pub fn classify(text: &str) -> Self {
        if text.contains(SHUTDOWN_MARKER) {
            ServerEvent::Shutdown
        } else if text.contains(RESTART_MARKER) {
            ServerEvent::Restart
        } else if text.contains(IDENTIFIED_MARKER) {
            ServerEvent::Identified
        } else {
            ServerEvent::Telemetry
        }
    }
}

/// Rangefinder angles in degrees: dense around the nose, 15° steps toward the sides.
///
/// `[-90, -75, -60, -45, -30, -20, -15, -10, -5, 0, 5, 10, 15, 20, 30, 45, 60, 75, 90]`
pub fn default_rangefinder_angles() -> [f64; RANGEFINDER_COUNT] {
    let mut angles = [0.0; RANGEFINDER_COUNT];
    let half = RANGEFINDER_COUNT / 2;

    for (step, slot) in (0u8..).zip(angles.iter_mut().take(half)) {
        let step = f64::from(step);
        *slot = if step < 5.0 {
            -90.0 + step * 15.0
        } else {
            -20.0 + (step - 5.0) * 5.0
        };
    }

    // Mirror the left half onto the right; the centre beam stays at 0.
    let left = angles;
    for (dst, src) in angles.iter_mut().rev().zip(left.iter().take(half)) {
        *dst = -src;
    }
    angles
}

/// Build the handshake datagram: `<bot_id>(init a0 ... a18)`.
pub fn handshake_message(bot_id: &str, angles: &[f64; RANGEFINDER_COUNT]) -> String {
    format!("{bot_id}{}", encode_init(angles))
}
