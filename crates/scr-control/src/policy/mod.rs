//! Driving policies.
//!
//! A policy looks at the current frame and the previous command and states what
//! it *wants* the actuators to do. It never clips or rate-limits; that is the
//! smoother's job.

mod manual;
mod model;

use std::fmt;

use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intent::RawIntent;

pub use manual::ManualPolicy;
pub use model::ModelPolicy;

/// Race stage the server runs the bot in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    WarmUp = 0,
    Qualifying = 1,
    Race = 2,
    #[default]
    Unknown = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stage must be between 0 and 3, got {0}")]
pub struct InvalidStage(pub u8);

impl TryFrom<u8> for Stage {
    type Error = InvalidStage;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Stage::WarmUp),
            1 => Ok(Stage::Qualifying),
            2 => Ok(Stage::Race),
            3 => Ok(Stage::Unknown),
            other => Err(InvalidStage(other)),
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage as u8
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::WarmUp => "warm-up",
            Stage::Qualifying => "qualifying",
            Stage::Race => "race",
            Stage::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Source of raw driving intent.
///
/// `compute` is infallible: a policy that cannot reach a decision must fall
/// back to an intent of its own rather than abort the session.
pub trait ControlPolicy: Send {
    fn name(&self) -> &'static str;

    fn stage(&self) -> Stage;

    fn compute(&mut self, frame: &TelemetryFrame, prior: &ControlCommand) -> RawIntent;

    /// Called when the server starts a new episode.
    fn on_restart(&mut self) {}

    /// Called when the server shuts the race down.
    fn on_shutdown(&mut self) {}
}
