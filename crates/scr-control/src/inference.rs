//! Inference collaborator used by [`ModelPolicy`](crate::ModelPolicy).
//!
//! The control loop only sees the [`InferenceModel`] trait: a fixed-order
//! feature vector goes in, a five-element `[accel, brake, clutch, gear, steer]`
//! prediction comes out. [`LinearModel`] is the bundled backend, a JSON-loaded
//! linear regressor with optional standard scaling. Anything else (a closure,
//! an external runtime binding) can be plugged in through the same trait.

use std::fmt;
use std::path::Path;

use racing_wheel_scr_protocol::{FOCUS_LEN, TRACK_LEN, TelemetryFrame, WHEEL_SPIN_LEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Number of values a prediction carries.
pub const PREDICTION_LEN: usize = 5;
/// Number of features fed to the model.
pub const FEATURE_COUNT: usize = 37;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("expected {expected} features, got {actual}")]
    FeatureLength { expected: usize, actual: usize },
    #[error("expected {expected} predicted values, got {actual}")]
    OutputLength { expected: usize, actual: usize },
    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse model: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inference backend failed: {0}")]
    Backend(String),
}

/// External predictor.
pub trait InferenceModel: Send + Sync {
    /// Predict `[accel, brake, clutch, gear, steer]` from features laid out as
    /// [`FEATURES`].
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

impl<F> InferenceModel for F
where
    F: Fn(&[f64]) -> Result<Vec<f64>, InferenceError> + Send + Sync,
{
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError> {
        self(features)
    }
}

/// One model input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Angle,
    DistFromStart,
    DistRaced,
    Focus(usize),
    Rpm,
    SpeedX,
    SpeedY,
    SpeedZ,
    TrackPos,
    Track(usize),
    WheelSpinVel(usize),
    Z,
}

impl Feature {
    /// Column name the model was trained with.
    pub fn name(&self) -> String {
        self.to_string()
    }

    fn value(&self, frame: &TelemetryFrame) -> f64 {
        match *self {
            Feature::Angle => frame.angle,
            Feature::DistFromStart => frame.dist_from_start,
            Feature::DistRaced => frame.dist_raced,
            Feature::Focus(i) => frame.focus.get(i).copied().unwrap_or(-1.0),
            Feature::Rpm => frame.rpm,
            Feature::SpeedX => frame.speed_x,
            Feature::SpeedY => frame.speed_y,
            Feature::SpeedZ => frame.speed_z,
            Feature::TrackPos => frame.track_pos,
            Feature::Track(i) => frame.track.get(i).copied().unwrap_or(0.0),
            Feature::WheelSpinVel(i) => frame.wheel_spin_vel.get(i).copied().unwrap_or(0.0),
            Feature::Z => frame.z,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Angle => f.write_str("angle"),
            Feature::DistFromStart => f.write_str("distFromStart"),
            Feature::DistRaced => f.write_str("distRaced"),
            Feature::Focus(i) => write!(f, "focus_{i}"),
            Feature::Rpm => f.write_str("rpm"),
            Feature::SpeedX => f.write_str("speedX"),
            Feature::SpeedY => f.write_str("speedY"),
            Feature::SpeedZ => f.write_str("speedZ"),
            Feature::TrackPos => f.write_str("trackPos"),
            Feature::Track(i) => write!(f, "track_{i}"),
            Feature::WheelSpinVel(i) => write!(f, "wheelSpinVel_{i}"),
            Feature::Z => f.write_str("z"),
        }
    }
}

/// Training column order: names sorted lexicographically, so `track_10`
/// comes before `track_2`.
pub const FEATURES: [Feature; FEATURE_COUNT] = [
    Feature::Angle,
    Feature::DistFromStart,
    Feature::DistRaced,
    Feature::Focus(0),
    Feature::Focus(1),
    Feature::Focus(2),
    Feature::Focus(3),
    Feature::Focus(4),
    Feature::Rpm,
    Feature::SpeedX,
    Feature::SpeedY,
    Feature::SpeedZ,
    Feature::TrackPos,
    Feature::Track(0),
    Feature::Track(1),
    Feature::Track(10),
    Feature::Track(11),
    Feature::Track(12),
    Feature::Track(13),
    Feature::Track(14),
    Feature::Track(15),
    Feature::Track(16),
    Feature::Track(17),
    Feature::Track(18),
    Feature::Track(2),
    Feature::Track(3),
    Feature::Track(4),
    Feature::Track(5),
    Feature::Track(6),
    Feature::Track(7),
    Feature::Track(8),
    Feature::Track(9),
    Feature::WheelSpinVel(0),
    Feature::WheelSpinVel(1),
    Feature::WheelSpinVel(2),
    Feature::WheelSpinVel(3),
    Feature::Z,
];

const _: () = assert!(FEATURE_COUNT == 9 + FOCUS_LEN + TRACK_LEN + WHEEL_SPIN_LEN);

/// Lay out a frame as the model's input vector.
pub fn extract_features(frame: &TelemetryFrame) -> [f64; FEATURE_COUNT] {
    let mut out = [0.0; FEATURE_COUNT];
    for (slot, feature) in out.iter_mut().zip(FEATURES.iter()) {
        *slot = feature.value(frame);
    }
    out
}

/// Per-column standardisation: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Columns with a zero scale are only centred.
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| {
                let divisor = if scale.abs() > f64::EPSILON { *scale } else { 1.0 };
                (x - mean) / divisor
            })
            .collect()
    }
}

/// Linear regressor: `prediction[i] = bias[i] + Σ weights[i][j] * x[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// One row per predicted value, one column per feature.
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl LinearModel {
    pub fn from_json(text: &str) -> Result<Self, InferenceError> {
        let model: Self = serde_json::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let model = Self::from_json(&text)?;
        debug!(path = %path.display(), scaled = model.scaler.is_some(), "Loaded linear model");
        Ok(model)
    }

    /// Check shapes and that every coefficient is finite.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.weights.len() != PREDICTION_LEN {
            return Err(InferenceError::InvalidModel(format!(
                "expected {PREDICTION_LEN} weight rows, got {}",
                self.weights.len()
            )));
        }
        if self.bias.len() != PREDICTION_LEN {
            return Err(InferenceError::InvalidModel(format!(
                "expected {PREDICTION_LEN} bias terms, got {}",
                self.bias.len()
            )));
        }
        for (row, weights) in self.weights.iter().enumerate() {
            if weights.len() != FEATURE_COUNT {
                return Err(InferenceError::InvalidModel(format!(
                    "weight row {row} has {} columns, expected {FEATURE_COUNT}",
                    weights.len()
                )));
            }
        }
        if let Some(scaler) = &self.scaler
            && (scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT)
        {
            return Err(InferenceError::InvalidModel(format!(
                "scaler must have {FEATURE_COUNT} columns"
            )));
        }

        let scaler_values = self
            .scaler
            .iter()
            .flat_map(|s| s.mean.iter().chain(s.scale.iter()));
        let all_finite = self
            .weights
            .iter()
            .flatten()
            .chain(self.bias.iter())
            .chain(scaler_values)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(InferenceError::InvalidModel(
                "coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl InferenceModel for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if features.len() != FEATURE_COUNT {
            return Err(InferenceError::FeatureLength {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite { index });
        }

        let scaled = match &self.scaler {
            Some(scaler) => scaler.transform(features),
            None => features.to_vec(),
        };

        let prediction: Vec<f64> = self
            .weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, bias)| bias + row.iter().zip(&scaled).map(|(w, x)| w * x).sum::<f64>())
            .collect();

        if let Some(index) = prediction.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite { index });
        }
        Ok(prediction)
    }
}
