//! Actuator command sent to the server once per tick.

use serde::{Deserialize, Serialize};

use crate::codec::{UNKNOWN_VALUE, WireMessage};
use crate::error::DecodeError;

/// Lowest gear the server accepts (reverse).
pub const GEAR_MIN: i32 = -1;
/// Highest gear the server accepts.
pub const GEAR_MAX: i32 = 6;

/// `meta` value asking the server to keep running the episode.
pub const META_CONTINUE: i32 = 0;
/// `meta` value asking the server to end (restart) the episode.
pub const META_RESTART: i32 = 1;

/// Actuator snapshot.
///
/// Every field always holds a defined value; there is no "missing" state at this
/// layer. Bounded fields are clipped by the controller before encoding:
/// `accel`, `brake`, `clutch` in `[0, 1]`, `steer` in `[-1, 1]`
/// (narrowed further by the steer lock), `gear` in `[GEAR_MIN, GEAR_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub accel: f64,
    pub brake: f64,
    pub clutch: f64,
    pub steer: f64,
    pub gear: i32,
    /// Focus sensor direction in degrees, echoed back unchanged.
    pub focus: i32,
    pub meta: i32,
}

impl Default for ControlCommand {
    fn default() -> Self {
        Self {
            accel: 0.0,
            brake: 0.0,
            clutch: 0.0,
            steer: 0.0,
            gear: 1,
            focus: 0,
            meta: META_CONTINUE,
        }
    }
}

impl ControlCommand {
    /// Neutral command: pedals released, wheel centred, first gear.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Whether `meta` asks the server to end the episode.
    pub fn requests_restart(&self) -> bool {
        self.meta == META_RESTART
    }

    /// Check every bounded field against its protocol domain.
    pub fn is_within_domain(&self) -> bool {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        unit(self.accel)
            && unit(self.brake)
            && unit(self.clutch)
            && (-1.0..=1.0).contains(&self.steer)
            && (GEAR_MIN..=GEAR_MAX).contains(&self.gear)
    }

    /// Rebuild a command from a decoded control message.
    ///
    /// Missing groups keep their [`Default`] value, mirroring how the server
    /// treats an omitted actuator.
    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        let defaults = Self::default();
        Ok(Self {
            accel: float_field(message, "accel")?.unwrap_or(defaults.accel),
            brake: float_field(message, "brake")?.unwrap_or(defaults.brake),
            clutch: float_field(message, "clutch")?.unwrap_or(defaults.clutch),
            steer: float_field(message, "steer")?.unwrap_or(defaults.steer),
            gear: int_field(message, "gear")?.unwrap_or(defaults.gear),
            focus: int_field(message, "focus")?.unwrap_or(defaults.focus),
            meta: int_field(message, "meta")?.unwrap_or(defaults.meta),
        })
    }
}

fn first_token<'a>(message: &'a WireMessage, key: &str) -> Option<&'a str> {
    message
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .filter(|token| *token != UNKNOWN_VALUE)
}

fn float_field(message: &WireMessage, key: &str) -> Result<Option<f64>, DecodeError> {
    first_token(message, key)
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DecodeError::invalid_number(key, token))
        })
        .transpose()
}

fn int_field(message: &WireMessage, key: &str) -> Result<Option<i32>, DecodeError> {
    first_token(message, key)
        .map(|token| {
            token
                .parse::<i32>()
                .map_err(|_parse| DecodeError::invalid_number(key, token))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_default_is_neutral_first_gear() {
        let cmd = ControlCommand::default();
        assert_eq!(cmd.gear, 1);
        assert_eq!(cmd.meta, META_CONTINUE);
        assert!(cmd.is_within_domain());
        assert!(!cmd.requests_restart());
    }

    #[test]
    fn test_domain_check_rejects_out_of_range() {
        let cmd = ControlCommand {
            accel: 1.5,
            ..ControlCommand::default()
        };
        assert!(!cmd.is_within_domain());

        let cmd = ControlCommand {
            gear: 7,
            ..ControlCommand::default()
        };
        assert!(!cmd.is_within_domain());
    }

    #[test]
    fn test_from_message_round_trip() -> TestResult {
        let cmd = ControlCommand {
            accel: 0.75,
            brake: 0.0,
            clutch: 0.5,
            steer: -0.25,
            gear: 3,
            focus: 0,
            meta: 0,
        };
        let back = ControlCommand::from_message(&decode(&encode(&cmd)))?;
        assert_eq!(back, cmd);
        Ok(())
    }

    #[test]
    fn test_from_message_meta_only() -> TestResult {
        let back = ControlCommand::from_message(&decode("(meta 1)"))?;
        assert!(back.requests_restart());
        assert_eq!(back.gear, 1);
        Ok(())
    }

    #[test]
    fn test_from_message_rejects_bad_gear() {
        let result = ControlCommand::from_message(&decode("(gear x)"));
        assert!(matches!(result, Err(DecodeError::InvalidNumber { .. })));
    }
}
