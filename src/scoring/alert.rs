use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Alert, AlertTier};

/// Lower bounds (inclusive) of each alert tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub severe_at: f64,
    pub mild_at: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            severe_at: 0.7,
            mild_at: 0.4,
        }
    }
}

impl AlertConfig {
    pub fn tier_for(&self, risk_score: f64) -> AlertTier {
        if risk_score >= self.severe_at {
            AlertTier::Severe
        } else if risk_score >= self.mild_at {
            AlertTier::Mild
        } else {
            AlertTier::None
        }
    }
}

/// Classifies with the default 0.4 / 0.7 boundaries.
pub fn classify(risk_score: f64, explanation: &str, timestamp: DateTime<Utc>) -> Alert {
    classify_with(&AlertConfig::default(), risk_score, explanation, timestamp)
}

/// Pure threshold mapping from a risk score to an alert, evaluated high to low.
pub fn classify_with(
    config: &AlertConfig,
    risk_score: f64,
    explanation: &str,
    timestamp: DateTime<Utc>,
) -> Alert {
    let tier = config.tier_for(risk_score);
    let (message, action_required, escalation_needed, confidence) = match tier {
        AlertTier::Severe => (
            format!("Severe health risk detected: {explanation}"),
            true,
            true,
            risk_score,
        ),
        AlertTier::Mild => (
            format!("Moderate health risk detected: {explanation}"),
            true,
            false,
            risk_score,
        ),
        AlertTier::None => (
            "No significant health risks detected".to_string(),
            false,
            false,
            1.0 - risk_score,
        ),
    };

    Alert {
        tier,
        message,
        action_required,
        escalation_needed,
        explanation: explanation.to_string(),
        confidence,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_closed_on_the_lower_end() {
        let now = Utc::now();
        assert_eq!(classify(0.4, "x", now).tier, AlertTier::Mild);
        assert_eq!(classify(0.7, "x", now).tier, AlertTier::Severe);
        assert_eq!(classify(0.399_999, "x", now).tier, AlertTier::None);
        assert_eq!(classify(0.699_999, "x", now).tier, AlertTier::Mild);
    }

    #[test]
    fn severe_alerts_escalate() {
        let alert = classify(0.9, "Low blood oxygen", Utc::now());
        assert!(alert.action_required);
        assert!(alert.escalation_needed);
        assert_eq!(alert.confidence, 0.9);
        assert_eq!(alert.message, "Severe health risk detected: Low blood oxygen");
    }

    #[test]
    fn mild_alerts_require_action_without_escalation() {
        let alert = classify(0.5, "Low blood glucose", Utc::now());
        assert_eq!(alert.tier, AlertTier::Mild);
        assert!(alert.action_required);
        assert!(!alert.escalation_needed);
        assert!(alert.message.contains("Low blood glucose"));
    }

    #[test]
    fn none_tier_ignores_explanation_in_message() {
        let alert = classify(0.25, "Elevated heart rate", Utc::now());
        assert_eq!(alert.message, "No significant health risks detected");
        assert_eq!(alert.explanation, "Elevated heart rate");
        assert!((alert.confidence - 0.75).abs() < 1e-12);
        assert!(!alert.action_required);
    }
}
