use std::sync::Arc;

use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame};
use tracing::{debug, trace};

use super::{ControlPolicy, Stage};
use crate::input::ManualInput;
use crate::intent::{ManualIntent, RawIntent};

/// Keyboard-driven policy.
///
/// Reads the shared [`ManualInput`] once per tick. Speed and lateral position are
/// logged but do not influence the intent.
#[derive(Debug)]
pub struct ManualPolicy {
    input: Arc<ManualInput>,
    stage: Stage,
}

impl ManualPolicy {
    pub fn new(input: Arc<ManualInput>, stage: Stage) -> Self {
        Self { input, stage }
    }

    pub fn input(&self) -> &Arc<ManualInput> {
        &self.input
    }
}

impl ControlPolicy for ManualPolicy {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn compute(&mut self, frame: &TelemetryFrame, _prior: &ControlCommand) -> RawIntent {
        let keys = self.input.snapshot();
        let gear = self.input.gear();
        trace!(
            speed_x = frame.speed_x,
            track_pos = frame.track_pos,
            ?keys,
            gear,
            "Manual input"
        );
        RawIntent::Manual(ManualIntent { keys, gear })
    }

    fn on_restart(&mut self) {
        self.input.reset_gear();
        debug!("Manual gear reset to first");
    }
}
