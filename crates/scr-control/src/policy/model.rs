use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame};
use tracing::{trace, warn};

use super::{ControlPolicy, Stage};
use crate::inference::{InferenceError, InferenceModel, PREDICTION_LEN, extract_features};
use crate::intent::{ModelIntent, RawIntent};

/// Policy backed by an [`InferenceModel`].
///
/// Inference failures never leave this type: any error turns into the
/// safe-decay intent for that tick.
pub struct ModelPolicy {
    model: Box<dyn InferenceModel>,
    stage: Stage,
    failures: u64,
}

impl ModelPolicy {
    pub fn new(model: Box<dyn InferenceModel>, stage: Stage) -> Self {
        Self {
            model,
            stage,
            failures: 0,
        }
    }

    /// Ticks that fell back to safe decay since construction.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn predict(&self, frame: &TelemetryFrame) -> Result<[f64; PREDICTION_LEN], InferenceError> {
        let features = extract_features(frame);
        let output = self.model.predict(&features)?;
        let actual = output.len();
        <[f64; PREDICTION_LEN]>::try_from(output).map_err(|_output| InferenceError::OutputLength {
            expected: PREDICTION_LEN,
            actual,
        })
    }
}

impl std::fmt::Debug for ModelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPolicy")
            .field("stage", &self.stage)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl ControlPolicy for ModelPolicy {
    fn name(&self) -> &'static str {
        "model"
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn compute(&mut self, frame: &TelemetryFrame, prior: &ControlCommand) -> RawIntent {
        match self.predict(frame) {
            Ok(prediction) => {
                trace!(?prediction, "Model prediction");
                RawIntent::Model(ModelIntent::from_prediction(prediction))
            }
            Err(err) => {
                self.failures = self.failures.saturating_add(1);
                warn!(error = %err, failures = self.failures, "Inference failed, applying safe decay");
                RawIntent::Model(ModelIntent::safe_decay(prior))
            }
        }
    }
}
