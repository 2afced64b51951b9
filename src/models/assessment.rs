//! Risk assessment and alert data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explanation used when no rule condition triggers.
pub const NO_RISK_EXPLANATION: &str = "No significant risks detected.";

/// Suffix appended to the explanation when the bias check fails.
pub const BIAS_FLAG_SUFFIX: &str = " (Bias detected in assessment)";

/// Outcome of the sequence-model leg of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ModelStatus {
    /// History shorter than the minimum window; the model was not invoked.
    Skipped { available: usize, required: usize },
    Scored { score: f64 },
    /// The model failed, timed out, or returned an out-of-range value.
    Failed { reason: String },
}

impl ModelStatus {
    pub fn score(&self) -> Option<f64> {
        match self {
            ModelStatus::Scored { score } => Some(*score),
            _ => None,
        }
    }
}

/// Calibrated risk plus the conditions that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Final score in `[0, 1]`.
    pub risk_score: f64,
    /// Triggered-condition labels in vital-check order.
    pub explanation: Vec<String>,
    /// Uncapped sum of rule penalties.
    pub rule_score: f64,
    pub model: ModelStatus,
    pub bias_flagged: bool,
}

impl RiskAssessment {
    /// Human-readable explanation, labels joined with " and ".
    pub fn explanation_text(&self) -> String {
        let mut text = if self.explanation.is_empty() {
            NO_RISK_EXPLANATION.to_string()
        } else {
            self.explanation.join(" and ")
        };
        if self.bias_flagged {
            text.push_str(BIAS_FLAG_SUFFIX);
        }
        text
    }

    pub(crate) fn flag_bias(mut self) -> Self {
        self.bias_flagged = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    None,
    Mild,
    Severe,
}

impl AlertTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::None => "none",
            AlertTier::Mild => "mild",
            AlertTier::Severe => "severe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(AlertTier::None),
            "mild" => Some(AlertTier::Mild),
            "severe" => Some(AlertTier::Severe),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub tier: AlertTier,
    pub message: String,
    pub action_required: bool,
    pub escalation_needed: bool,
    pub explanation: String,
    /// `risk_score` for mild/severe, `1 - risk_score` for none.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}
