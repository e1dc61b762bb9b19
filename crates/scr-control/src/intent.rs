//! Raw intent produced by a policy before smoothing.

use racing_wheel_scr_protocol::ControlCommand;

use crate::input::KeySnapshot;

/// Accel decrement applied by the safe-decay fallback.
pub const SAFE_DECAY_ACCEL_STEP: f64 = 0.1;
/// Brake increment applied by the safe-decay fallback.
pub const SAFE_DECAY_BRAKE_STEP: f64 = 0.1;
/// Steer multiplier applied by the safe-decay fallback.
pub const SAFE_DECAY_STEER_FACTOR: f64 = 0.5;
/// Clutch decrement applied by the safe-decay fallback.
pub const SAFE_DECAY_CLUTCH_STEP: f64 = 0.1;

/// Desired actuator values before rate limiting and clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawIntent {
    /// Held keys plus the manual gear counter; pedals and steering are
    /// rate-limited by the smoother.
    Manual(ManualIntent),
    /// Numeric targets from a model prediction or the safe-decay fallback.
    Model(ModelIntent),
}

/// Manual driving intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManualIntent {
    pub keys: KeySnapshot,
    /// Externally maintained gear counter.
    pub gear: i32,
}

/// Model driving intent.
///
/// `accel_delta` is *added* to the previous accel value while the other fields are
/// absolute targets. The trained model was calibrated against exactly this
/// asymmetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelIntent {
    pub accel_delta: f64,
    pub brake_target: f64,
    pub steer_target: f64,
    pub gear_target: f64,
    pub clutch_target: f64,
}

impl ModelIntent {
    /// Map a `[accel, brake, clutch, gear, steer]` prediction to an intent.
    ///
    /// The clutch prediction is ignored; model driving never rides the clutch.
    pub fn from_prediction(prediction: [f64; 5]) -> Self {
        let [accel, brake, _clutch, gear, steer] = prediction;
        Self {
            accel_delta: accel,
            brake_target: brake,
            steer_target: steer,
            gear_target: gear,
            clutch_target: 0.0,
        }
    }

    /// Fallback used whenever the normal decision path fails: ease off the
    /// throttle, build brake pressure, halve the steering and drop to first gear.
    pub fn safe_decay(prior: &ControlCommand) -> Self {
        Self {
            accel_delta: -SAFE_DECAY_ACCEL_STEP,
            brake_target: prior.brake + SAFE_DECAY_BRAKE_STEP,
            steer_target: prior.steer * SAFE_DECAY_STEER_FACTOR,
            gear_target: 1.0,
            clutch_target: prior.clutch - SAFE_DECAY_CLUTCH_STEP,
        }
    }
}
