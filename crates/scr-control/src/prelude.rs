//! Convenience re-exports for driving the control pipeline.

pub use crate::inference::{InferenceError, InferenceModel, LinearModel};
pub use crate::input::{DriveKey, InputEvent, ManualInput};
pub use crate::intent::{ModelIntent, RawIntent};
pub use crate::pipeline::DrivePipeline;
pub use crate::policy::{ControlPolicy, ManualPolicy, ModelPolicy, Stage};
pub use crate::smoother::{ControlSmoother, SmootherConfig};
