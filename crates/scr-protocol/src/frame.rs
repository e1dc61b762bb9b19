//! Decoded sensor snapshot.
//!
//! Absence is resolved here, once: a missing key or the `-` sentinel maps to the
//! field's default (`0.0` for scalars, [`FOCUS_DEFAULT`] for focus elements, `0.0`
//! for the other vectors). Only a value that is *present* and malformed is an
//! error.

use crate::codec::{UNKNOWN_VALUE, WireMessage};
use crate::error::DecodeError;

/// Number of track-edge rangefinders.
pub const TRACK_LEN: usize = 19;
/// Number of focus rangefinders.
pub const FOCUS_LEN: usize = 5;
/// Number of wheels reporting spin velocity.
pub const WHEEL_SPIN_LEN: usize = 4;
/// Number of opponent sectors.
pub const OPPONENTS_LEN: usize = 36;

/// Focus readings the server reports when the focus sensor is unavailable.
pub const FOCUS_DEFAULT: f64 = -1.0;

/// One tick of telemetry, built fresh from each datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    /// Angle between car heading and track axis (rad).
    pub angle: f64,
    /// Lateral position: 0 on the axis, ±1 on the edges.
    pub track_pos: f64,
    pub speed_x: f64,
    pub speed_y: f64,
    pub speed_z: f64,
    pub rpm: f64,
    pub dist_raced: f64,
    pub dist_from_start: f64,
    /// Height of the car's centre of mass above the track.
    pub z: f64,
    /// Gear reported by the server.
    pub gear: f64,
    pub fuel: f64,
    pub damage: f64,
    pub race_pos: f64,
    pub cur_lap_time: f64,
    pub last_lap_time: f64,
    pub track: [f64; TRACK_LEN],
    pub focus: [f64; FOCUS_LEN],
    pub wheel_spin_vel: [f64; WHEEL_SPIN_LEN],
    /// Opponent distances; `None` when the server omitted the group.
    pub opponents: Option<[f64; OPPONENTS_LEN]>,
}

impl Default for TelemetryFrame {
    fn default() -> Self {
        Self {
            angle: 0.0,
            track_pos: 0.0,
            speed_x: 0.0,
            speed_y: 0.0,
            speed_z: 0.0,
            rpm: 0.0,
            dist_raced: 0.0,
            dist_from_start: 0.0,
            z: 0.0,
            gear: 0.0,
            fuel: 0.0,
            damage: 0.0,
            race_pos: 0.0,
            cur_lap_time: 0.0,
            last_lap_time: 0.0,
            track: [0.0; TRACK_LEN],
            focus: [FOCUS_DEFAULT; FOCUS_LEN],
            wheel_spin_vel: [0.0; WHEEL_SPIN_LEN],
            opponents: None,
        }
    }
}

/// Result of lossy decoding: a complete frame plus every field that fell back
/// to its default because it was malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub frame: TelemetryFrame,
    pub errors: Vec<DecodeError>,
}

impl DecodedFrame {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decode a frame, failing on the first malformed field.
pub fn decode_frame(message: &WireMessage) -> Result<TelemetryFrame, DecodeError> {
    let decoded = decode_frame_lossy(message);
    match decoded.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(decoded.frame),
    }
}

/// Decode a frame, replacing each malformed field with its default and
/// reporting it in [`DecodedFrame::errors`].
pub fn decode_frame_lossy(message: &WireMessage) -> DecodedFrame {
    let mut decoder = FrameDecoder {
        message,
        errors: Vec::new(),
    };
    let defaults = TelemetryFrame::default();

    let frame = TelemetryFrame {
        angle: decoder.scalar("angle", defaults.angle),
        track_pos: decoder.scalar("trackPos", defaults.track_pos),
        speed_x: decoder.scalar("speedX", defaults.speed_x),
        speed_y: decoder.scalar("speedY", defaults.speed_y),
        speed_z: decoder.scalar("speedZ", defaults.speed_z),
        rpm: decoder.scalar("rpm", defaults.rpm),
        dist_raced: decoder.scalar("distRaced", defaults.dist_raced),
        dist_from_start: decoder.scalar("distFromStart", defaults.dist_from_start),
        z: decoder.scalar("z", defaults.z),
        gear: decoder.scalar("gear", defaults.gear),
        fuel: decoder.scalar("fuel", defaults.fuel),
        damage: decoder.scalar("damage", defaults.damage),
        race_pos: decoder.scalar("racePos", defaults.race_pos),
        cur_lap_time: decoder.scalar("curLapTime", defaults.cur_lap_time),
        last_lap_time: decoder.scalar("lastLapTime", defaults.last_lap_time),
        track: decoder
            .vector("track", 0.0)
            .unwrap_or(defaults.track),
        focus: decoder
            .vector("focus", FOCUS_DEFAULT)
            .unwrap_or(defaults.focus),
        wheel_spin_vel: decoder
            .vector("wheelSpinVel", 0.0)
            .unwrap_or(defaults.wheel_spin_vel),
        opponents: decoder.vector("opponents", 0.0),
    };

    DecodedFrame {
        frame,
        errors: decoder.errors,
    }
}

struct FrameDecoder<'a> {
    message: &'a WireMessage,
    errors: Vec<DecodeError>,
}

impl<'a> FrameDecoder<'a> {
    /// Present, non-sentinel value tokens for `key`, or `None` when absent.
    fn tokens(&self, key: &str) -> Option<&'a [String]> {
        let message: &'a WireMessage = self.message;
        let values = message.get(key)?;
        let all_unknown = values.iter().all(|v| v == UNKNOWN_VALUE);
        if all_unknown {
            None
        } else {
            Some(values.as_slice())
        }
    }

    fn scalar(&mut self, key: &str, default: f64) -> f64 {
        let Some(token) = self.tokens(key).and_then(|values| values.first()) else {
            return default;
        };
        match parse_number(key, token) {
            Ok(value) => value,
            Err(err) => {
                self.errors.push(err);
                default
            }
        }
    }

    fn vector<const N: usize>(&mut self, key: &str, element_default: f64) -> Option<[f64; N]> {
        let values = self.tokens(key)?;
        if values.len() != N {
            self.errors
                .push(DecodeError::vector_length(key, N, values.len()));
            return None;
        }

        let mut out = [element_default; N];
        for (slot, token) in out.iter_mut().zip(values) {
            if token == UNKNOWN_VALUE {
                continue;
            }
            match parse_number(key, token) {
                Ok(value) => *slot = value,
                Err(err) => {
                    self.errors.push(err);
                    return None;
                }
            }
        }
        Some(out)
    }
}

fn parse_number(key: &str, token: &str) -> Result<f64, DecodeError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::invalid_number(key, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_empty_message_is_all_defaults() -> TestResult {
        let frame = decode_frame(&WireMessage::new())?;
        assert_eq!(frame, TelemetryFrame::default());
        Ok(())
    }

    #[test]
    fn test_sentinel_maps_to_default() -> TestResult {
        let frame = decode_frame(&decode("(rpm -)(focus -)"))?;
        assert!(frame.rpm.abs() < f64::EPSILON);
        assert_eq!(frame.focus, [FOCUS_DEFAULT; FOCUS_LEN]);
        Ok(())
    }

    #[test]
    fn test_element_sentinel_inside_vector() -> TestResult {
        let frame = decode_frame(&decode("(wheelSpinVel 1 - 3 4)"))?;
        assert_eq!(frame.wheel_spin_vel, [1.0, 0.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_short_vector_is_error() {
        let result = decode_frame(&decode("(track 1 2 3)"));
        assert_eq!(
            result,
            Err(DecodeError::VectorLength {
                key: "track".to_string(),
                expected: TRACK_LEN,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_lossy_keeps_good_fields() {
        let decoded = decode_frame_lossy(&decode("(rpm abc)(speedX 12.5)"));
        assert_eq!(decoded.errors.len(), 1);
        assert!(decoded.frame.rpm.abs() < f64::EPSILON);
        assert!((decoded.frame.speed_x - 12.5).abs() < 1e-12);
        assert!(!decoded.is_clean());
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let decoded = decode_frame_lossy(&decode("(angle NaN)(z inf)"));
        assert_eq!(decoded.errors.len(), 2);
    }

    #[test]
    fn test_opponents_optional() -> TestResult {
        let frame = decode_frame(&decode("(rpm 1)"))?;
        assert!(frame.opponents.is_none());

        let values = vec!["200"; OPPONENTS_LEN].join(" ");
        let frame = decode_frame(&decode(&format!("(opponents {values})")))?;
        assert_eq!(frame.opponents, Some([200.0; OPPONENTS_LEN]));
        Ok(())
    }
}
