//! Per-tick hook invoked after each command is computed.

use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame};
use tracing::{debug, trace};

/// Sees every `(frame, command)` pair the engine produces, in order.
pub trait TickObserver: Send {
    fn on_tick(&mut self, step: u64, frame: &TelemetryFrame, command: &ControlCommand);
}

/// Discards every tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TickObserver for NoopObserver {
    fn on_tick(&mut self, _step: u64, _frame: &TelemetryFrame, _command: &ControlCommand) {}
}

/// Logs a driving summary at `debug` and the full pair at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TickObserver for TracingObserver {
    fn on_tick(&mut self, step: u64, frame: &TelemetryFrame, command: &ControlCommand) {
        debug!(
            step,
            speed = frame.speed_x,
            rpm = frame.rpm,
            gear = command.gear,
            accel = command.accel,
            brake = command.brake,
            steer = command.steer,
            clutch = command.clutch,
            "Tick"
        );
        trace!(step, ?frame, ?command, "Tick detail");
    }
}
