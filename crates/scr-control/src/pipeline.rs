//! Policy plus smoother, carrying the previous command between ticks.

use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame};
use tracing::debug;

use crate::policy::{ControlPolicy, Stage};
use crate::smoother::{ControlSmoother, SmootherConfig};

/// Per-session control pipeline: `frame -> policy -> smoother -> command`.
pub struct DrivePipeline {
    policy: Box<dyn ControlPolicy>,
    smoother: ControlSmoother,
    last_command: ControlCommand,
}

impl DrivePipeline {
    pub fn new(policy: Box<dyn ControlPolicy>, config: SmootherConfig) -> Self {
        Self {
            policy,
            smoother: ControlSmoother::new(config),
            last_command: ControlCommand::neutral(),
        }
    }

    /// Compute the command answering `frame`.
    pub fn step(&mut self, frame: &TelemetryFrame) -> ControlCommand {
        let intent = self.policy.compute(frame, &self.last_command);
        let command = self.smoother.apply(&intent, frame.rpm, &self.last_command);
        self.last_command = command;
        command
    }

    /// Reset controller state for a new episode.
    pub fn on_restart(&mut self) {
        self.smoother.reset();
        self.last_command = ControlCommand::neutral();
        self.policy.on_restart();
        debug!(policy = self.policy.name(), "Pipeline reset");
    }

    pub fn on_shutdown(&mut self) {
        self.policy.on_shutdown();
    }

    pub fn last_command(&self) -> &ControlCommand {
        &self.last_command
    }

    pub fn smoother(&self) -> &ControlSmoother {
        &self.smoother
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn stage(&self) -> Stage {
        self.policy.stage()
    }
}

impl std::fmt::Debug for DrivePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrivePipeline")
            .field("policy", &self.policy.name())
            .field("smoother", &self.smoother)
            .field("last_command", &self.last_command)
            .finish()
    }
}
