use serde::{Deserialize, Serialize};

use crate::models::Vital;

/// Which side of the cutoff triggers a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// One rule-based vital check. Rules are evaluated in table order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalRule {
    pub vital: Vital,
    pub direction: Direction,
    /// Population cutoff; the comparison is strict.
    pub cutoff: f64,
    /// Additive, non-negative penalty.
    pub penalty: f64,
    pub label: String,
}

impl VitalRule {
    fn new(vital: Vital, direction: Direction, cutoff: f64, penalty: f64, label: &str) -> Self {
        Self {
            vital,
            direction,
            cutoff,
            penalty,
            label: label.to_string(),
        }
    }
}

/// How rule cutoffs are chosen for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ThresholdMode {
    /// Fixed population defaults from the rule table.
    Population,
    /// `mean ± k·std` from the patient's baseline once it has `min_samples`
    /// observations of the vital with non-zero spread.
    Personalized { k: f64, min_samples: usize },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Population
    }
}

/// Configuration for risk scoring with tunable thresholds and fusion weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rules: Vec<VitalRule>,
    pub threshold_mode: ThresholdMode,

    /// Fusion weights: `rule_weight * rule + model_weight * model`
    pub rule_weight: f64,
    pub model_weight: f64,

    /// Prior readings required before the sequence model is consulted
    pub min_history: usize,
    /// Rows in each feature window handed to the model
    pub window_length: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            threshold_mode: ThresholdMode::Population,
            rule_weight: 0.7,
            model_weight: 0.3,
            min_history: 10,
            window_length: 10,
        }
    }
}

pub fn default_rules() -> Vec<VitalRule> {
    vec![
        VitalRule::new(Vital::HeartRate, Direction::Above, 100.0, 0.3, "Elevated heart rate"),
        VitalRule::new(Vital::HeartRate, Direction::Below, 60.0, 0.2, "Low heart rate"),
        VitalRule::new(Vital::BloodGlucose, Direction::Above, 180.0, 0.4, "High blood glucose"),
        VitalRule::new(Vital::BloodGlucose, Direction::Below, 70.0, 0.5, "Low blood glucose"),
        VitalRule::new(Vital::Spo2, Direction::Below, 95.0, 0.3, "Low blood oxygen"),
    ]
}
