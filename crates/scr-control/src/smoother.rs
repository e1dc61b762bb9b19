//! Rate-limited actuator controller.
//!
//! The smoother owns the only mutable controller state in a session. Manual
//! intents are slewed toward their targets a fixed step per tick; model intents
//! are clipped into the actuator domain. In both modes the clutch is engaged
//! whenever engine speed jumps between consecutive ticks.

use racing_wheel_scr_protocol::{ControlCommand, GEAR_MAX, GEAR_MIN, META_CONTINUE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::input::KeySnapshot;
use crate::intent::{ManualIntent, ModelIntent, RawIntent};

/// Reverse gear accelerates at half rate up to half throttle.
const REVERSE_ACCEL_FACTOR: f64 = 0.5;
const REVERSE_ACCEL_CAP: f64 = 0.5;
/// Lowest gear a model may select.
const MODEL_GEAR_MIN: i32 = 1;

/// Tuning for [`ControlSmoother`]. All rates are per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub accel_rate: f64,
    pub brake_rate: f64,
    /// Steer step when moving away from centre.
    pub steer_rate: f64,
    /// Steer step when returning toward centre.
    pub steer_center_rate: f64,
    /// Maximum steer magnitude in radians.
    pub steer_lock: f64,
    /// Engine-speed change between ticks above which the clutch is engaged.
    pub clutch_rpm_jump: f64,
    /// Clutch value used during an engine-speed jump.
    pub clutch_engage: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            accel_rate: 0.05,
            brake_rate: 0.1,
            steer_rate: 0.005,
            steer_center_rate: 0.02,
            steer_lock: 0.785398,
            clutch_rpm_jump: 1000.0,
            clutch_engage: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmootherConfigError {
    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("steer_lock must be in (0, 1], got {0}")]
    SteerLock(f64),
    #[error("clutch_engage must be in [0, 1], got {0}")]
    ClutchEngage(f64),
}

impl SmootherConfig {
    pub fn validate(&self) -> Result<(), SmootherConfigError> {
        let rates = [
            ("accel_rate", self.accel_rate),
            ("brake_rate", self.brake_rate),
            ("steer_rate", self.steer_rate),
            ("steer_center_rate", self.steer_center_rate),
            ("clutch_rpm_jump", self.clutch_rpm_jump),
        ];
        for (field, value) in rates {
            if !(value.is_finite() && value > 0.0) {
                return Err(SmootherConfigError::NonPositive { field, value });
            }
        }
        if !(self.steer_lock > 0.0 && self.steer_lock <= 1.0) {
            return Err(SmootherConfigError::SteerLock(self.steer_lock));
        }
        if !(0.0..=1.0).contains(&self.clutch_engage) {
            return Err(SmootherConfigError::ClutchEngage(self.clutch_engage));
        }
        Ok(())
    }
}

/// Previous step's actuator values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub accel: f64,
    pub brake: f64,
    pub steer: f64,
    pub gear: i32,
    /// Engine speed seen on the previous tick; `None` right after a reset.
    pub prev_rpm: Option<f64>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            accel: 0.0,
            brake: 0.0,
            steer: 0.0,
            gear: 1,
            prev_rpm: None,
        }
    }
}

/// Stateful controller turning a [`RawIntent`] into a clipped [`ControlCommand`].
#[derive(Debug, Clone)]
pub struct ControlSmoother {
    config: SmootherConfig,
    state: ControllerState,
}

impl Default for ControlSmoother {
    fn default() -> Self {
        Self::new(SmootherConfig::default())
    }
}

impl ControlSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            state: ControllerState::default(),
        }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Back to neutral: pedals released, wheel centred, first gear, no rpm history.
    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }

    /// Produce the command for this tick.
    ///
    /// `prior` is the command sent on the previous tick; its `focus` is echoed
    /// back unchanged and `meta` is reset to continue. Every bounded field of
    /// the result is within its domain.
    pub fn apply(
        &mut self,
        intent: &RawIntent,
        rpm: f64,
        prior: &ControlCommand,
    ) -> ControlCommand {
        let mut command = *prior;
        command.meta = META_CONTINUE;

        let clutch_target = match intent {
            RawIntent::Manual(manual) => {
                self.apply_manual(manual);
                0.0
            }
            RawIntent::Model(model) => {
                self.apply_model(model);
                model.clutch_target
            }
        };

        command.accel = self.state.accel;
        command.brake = self.state.brake;
        command.steer = self.state.steer;
        command.gear = self.state.gear;
        command.clutch = self.clutch(rpm, clutch_target);

        trace!(
            accel = command.accel,
            brake = command.brake,
            steer = command.steer,
            gear = command.gear,
            clutch = command.clutch,
            "Smoothed command"
        );
        command
    }

    fn apply_manual(&mut self, intent: &ManualIntent) {
        let ManualIntent { keys, gear } = *intent;
        let cfg = self.config;
        let state = &mut self.state;

        state.gear = gear.clamp(GEAR_MIN, GEAR_MAX);

        if keys.forward {
            state.brake = (state.brake - cfg.brake_rate * 2.0).max(0.0);
            state.accel = if state.gear == GEAR_MIN {
                (state.accel + cfg.accel_rate * REVERSE_ACCEL_FACTOR).min(REVERSE_ACCEL_CAP)
            } else {
                (state.accel + cfg.accel_rate).min(1.0)
            };
        } else {
            state.accel = (state.accel - cfg.accel_rate * 1.5).max(0.0);
        }

        if keys.backward {
            state.accel = (state.accel - cfg.accel_rate * 2.0).max(0.0);
            state.brake = (state.brake + cfg.brake_rate * 2.0).min(1.0);
        } else {
            state.brake = (state.brake - cfg.brake_rate).max(0.0);
        }

        let target = steer_target(keys, cfg.steer_lock);
        state.steer = step_steer(state.steer, target, &cfg).clamp(-cfg.steer_lock, cfg.steer_lock);
    }

    fn apply_model(&mut self, intent: &ModelIntent) {
        let lock = self.config.steer_lock;
        let state = &mut self.state;

        state.accel = clip_or_keep(state.accel + intent.accel_delta, 0.0, 1.0, state.accel);
        state.brake = clip_or_keep(intent.brake_target, 0.0, 1.0, state.brake);
        state.steer = clip_or_keep(intent.steer_target, -lock, lock, state.steer);
        state.gear = model_gear(intent.gear_target, state.gear);
    }

    fn clutch(&mut self, rpm: f64, target: f64) -> f64 {
        let jumped = self
            .state
            .prev_rpm
            .is_some_and(|prev| (rpm - prev).abs() > self.config.clutch_rpm_jump);
        if rpm.is_finite() {
            self.state.prev_rpm = Some(rpm);
        }
        if jumped {
            trace!(rpm, "Engine speed jump, engaging clutch");
            self.config.clutch_engage
        } else {
            clip_or_keep(target, 0.0, 1.0, 0.0)
        }
    }
}

/// Left wins over right when both are held.
fn steer_target(keys: KeySnapshot, lock: f64) -> f64 {
    if keys.left {
        lock
    } else if keys.right {
        -lock
    } else {
        0.0
    }
}

/// Move `current` one step toward `target`, turning slowly and centring fast.
fn step_steer(current: f64, target: f64, cfg: &SmootherConfig) -> f64 {
    if current < target {
        let rate = if target > 0.0 {
            cfg.steer_rate
        } else {
            cfg.steer_center_rate
        };
        (current + rate).min(target)
    } else if current > target {
        let rate = if target < 0.0 {
            cfg.steer_rate
        } else {
            cfg.steer_center_rate
        };
        (current - rate).max(target)
    } else {
        current
    }
}

/// Clip into `[lo, hi]`; NaN keeps `fallback`, infinities land on the bound.
fn clip_or_keep(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

fn model_gear(target: f64, fallback: i32) -> i32 {
    if target.is_nan() {
        return fallback.clamp(MODEL_GEAR_MIN, GEAR_MAX);
    }
    let rounded = target.round().clamp(f64::from(MODEL_GEAR_MIN), f64::from(GEAR_MAX));
    #[expect(
        clippy::cast_possible_truncation,
        reason = "rounded and clamped to the gear range"
    )]
    let gear = rounded as i32;
    gear
}
