//! Pluggable sequence risk model.
//!
//! Any type implementing [`SequenceRiskModel`] can be handed to the scorer:
//! a statistical heuristic, a small learned model, or a synchronous adapter
//! over something heavier. The scorer only relies on the contract checked by
//! [`checked_score`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::window::{FeatureWindow, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model invocation failed: {0}")]
    Failed(String),
    #[error("model returned out-of-range score {0}")]
    OutOfRange(f64),
    #[error("model did not finish within {0} ms")]
    TimedOut(u64),
    #[error("model panicked: {0}")]
    Panicked(String),
}

/// Maps a feature window to a probability-like risk in `[0, 1]`.
///
/// Implementations must be deterministic for a given window and model state,
/// and must not perform I/O or block on external services.
pub trait SequenceRiskModel: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, window: &FeatureWindow) -> Result<f64, ModelError>;
}

/// Invokes `model` and enforces the output contract.
///
/// Panics and non-finite or out-of-range outputs come back as errors so the
/// caller can fall back to rule-only scoring.
pub fn checked_score(model: &dyn SequenceRiskModel, window: &FeatureWindow) -> Result<f64, ModelError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| model.score(window))).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ModelError::Panicked(message)
    })?;

    let score = outcome?;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(ModelError::OutOfRange(score));
    }
    Ok(score)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Logistic model over the newest row and the first-to-last trend of a window.
///
/// Weights are in [`Vital::ALL`](crate::models::Vital::ALL) order. Because the
/// window is standardized over itself, the level term measures how far the
/// newest reading sits from the patient's recent readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticTrendModel {
    pub model_name: String,
    pub level_weights: [f64; FEATURE_COUNT],
    pub trend_weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl Default for LogisticTrendModel {
    fn default() -> Self {
        Self {
            model_name: "logistic-trend-v1".into(),
            // heart_rate, systolic, diastolic, blood_glucose, spo2, sleep_hours, activity_steps
            level_weights: [0.35, 0.20, 0.10, 0.30, -0.35, -0.10, -0.10],
            trend_weights: [0.15, 0.10, 0.05, 0.15, -0.20, -0.05, -0.05],
            bias: -1.5,
        }
    }
}

impl LogisticTrendModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model weights from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse model weights in {}", path.display()))
    }
}

impl SequenceRiskModel for LogisticTrendModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn score(&self, window: &FeatureWindow) -> Result<f64, ModelError> {
        let (Some(first), Some(latest)) = (window.first(), window.latest()) else {
            return Err(ModelError::Failed("empty feature window".into()));
        };

        let mut logit = self.bias;
        for i in 0..FEATURE_COUNT {
            logit += self.level_weights[i] * latest[i];
            logit += self.trend_weights[i] * (latest[i] - first[i]);
        }

        Ok(sigmoid(logit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reading, Vital};
    use crate::scoring::window::build_window;
    use chrono::{Duration, TimeZone, Utc};

    struct Constant(f64);

    impl SequenceRiskModel for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn score(&self, _window: &FeatureWindow) -> Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    struct Exploding;

    impl SequenceRiskModel for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn score(&self, _window: &FeatureWindow) -> Result<f64, ModelError> {
            panic!("weights not loaded")
        }
    }

    fn window(rising: bool) -> FeatureWindow {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let history: Vec<Reading> = (0..10)
            .map(|i| {
                let hr = if rising { 70.0 + 5.0 * i as f64 } else { 110.0 - 5.0 * i as f64 };
                Reading::new("P001", start + Duration::minutes(i))
                    .with_vital(Vital::HeartRate, hr)
                    .with_vital(Vital::Spo2, 98.0)
            })
            .collect();
        build_window(&history, 10).unwrap()
    }

    #[test]
    fn checked_score_rejects_out_of_range_values() {
        let w = window(true);
        assert_eq!(checked_score(&Constant(1.5), &w), Err(ModelError::OutOfRange(1.5)));
        assert!(matches!(
            checked_score(&Constant(f64::NAN), &w),
            Err(ModelError::OutOfRange(_))
        ));
        assert_eq!(checked_score(&Constant(0.25), &w), Ok(0.25));
    }

    #[test]
    fn checked_score_catches_panics() {
        let err = checked_score(&Exploding, &window(true)).unwrap_err();
        assert!(matches!(err, ModelError::Panicked(msg) if msg.contains("weights not loaded")));
    }

    #[test]
    fn logistic_model_rates_rising_heart_rate_higher() {
        let model = LogisticTrendModel::default();
        let rising = model.score(&window(true)).unwrap();
        let falling = model.score(&window(false)).unwrap();
        assert!(rising > falling);
        assert!((0.0..=1.0).contains(&rising));
    }

    #[test]
    fn logistic_model_is_deterministic() {
        let model = LogisticTrendModel::default();
        let w = window(true);
        assert_eq!(
            model.score(&w).unwrap().to_bits(),
            model.score(&w).unwrap().to_bits()
        );
    }

    #[test]
    fn load_model_from_json_file() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("model.json");
        let model = LogisticTrendModel {
            model_name: "custom".into(),
            bias: 0.0,
            ..LogisticTrendModel::default()
        };
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).expect("write");
        let loaded = LogisticTrendModel::load(&path).expect("load");
        assert_eq!(loaded, model);
    }
}
