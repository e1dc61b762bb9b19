//! Control pipeline for the SCR client.
//!
//! Turns a decoded [`TelemetryFrame`](racing_wheel_scr_protocol::TelemetryFrame)
//! into a [`ControlCommand`](racing_wheel_scr_protocol::ControlCommand) in two
//! stages:
//!
//! 1. A [`ControlPolicy`] produces a [`RawIntent`]: unclipped, unsmoothed desired
//!    actuator values, either from held keys ([`ManualPolicy`]) or from a model
//!    prediction ([`ModelPolicy`]).
//! 2. The [`ControlSmoother`] applies rate limits, domain clipping and the
//!    rpm-jump clutch rule so actuator values never jump discontinuously.
//!
//! [`DrivePipeline`] wires both stages together and carries the previous command
//! from tick to tick.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use racing_wheel_scr_control::prelude::*;
//! use racing_wheel_scr_protocol::TelemetryFrame;
//!
//! let input = Arc::new(ManualInput::new());
//! let policy = ManualPolicy::new(Arc::clone(&input), Stage::Unknown);
//! let mut pipeline = DrivePipeline::new(Box::new(policy), SmootherConfig::default());
//!
//! input.press(DriveKey::Forward);
//! let command = pipeline.step(&TelemetryFrame::default());
//! assert!(command.accel > 0.0);
//! ```

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod inference;
pub mod input;
pub mod intent;
pub mod pipeline;
pub mod policy;
pub mod prelude;
pub mod smoother;

pub use inference::{
    FEATURE_COUNT, FEATURES, Feature, InferenceError, InferenceModel, LinearModel,
    PREDICTION_LEN, StandardScaler, extract_features,
};
pub use input::{DriveKey, InputEvent, KeySnapshot, ManualInput};
pub use intent::{ManualIntent, ModelIntent, RawIntent};
pub use pipeline::DrivePipeline;
pub use policy::{ControlPolicy, InvalidStage, ManualPolicy, ModelPolicy, Stage};
pub use smoother::{ControlSmoother, ControllerState, SmootherConfig, SmootherConfigError};
