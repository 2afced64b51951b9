use std::sync::Arc;

use crate::baseline::PatientBaseline;
use crate::models::{ModelStatus, Reading, RiskAssessment};
use crate::scoring::config::ScoringConfig;
use crate::scoring::model::{checked_score, LogisticTrendModel, SequenceRiskModel};
use crate::scoring::rules::{self, RuleScore};
use crate::scoring::window::{build_window, FeatureWindow};

// Set to true to enable per-reading logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Hybrid rule-based + sequence-model risk scorer.
#[derive(Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
    model: Arc<dyn SequenceRiskModel>,
}

impl std::fmt::Debug for RiskScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskScorer")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .finish()
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default(), Arc::new(LogisticTrendModel::default()))
    }
}

impl RiskScorer {
    pub fn new(config: ScoringConfig, model: Arc<dyn SequenceRiskModel>) -> Self {
        Self { config, model }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn SequenceRiskModel> {
        &self.model
    }

    /// Scores `reading` against the prior `history` with population cutoffs.
    pub fn assess(&self, reading: &Reading, history: &[Reading]) -> RiskAssessment {
        self.assess_with_baseline(reading, history, None)
    }

    /// Scores `reading`, personalizing cutoffs from `baseline` when configured.
    ///
    /// Total: every input yields an assessment with `risk_score` in `[0, 1]`.
    pub fn assess_with_baseline(
        &self,
        reading: &Reading,
        history: &[Reading],
        baseline: Option<&PatientBaseline>,
    ) -> RiskAssessment {
        let rule = self.rule_component(reading, baseline);
        let model = match self.prepare_window(reading, history) {
            Ok(window) => self.score_window(&reading.patient_id, &window),
            Err(skipped) => skipped,
        };
        self.fuse(rule, model)
    }

    pub fn rule_component(&self, reading: &Reading, baseline: Option<&PatientBaseline>) -> RuleScore {
        rules::evaluate(&self.config.rules, self.config.threshold_mode, reading, baseline)
    }

    /// Builds the model input over `history + [reading]`.
    ///
    /// Returns `Err(ModelStatus::Skipped)` while the prior history is shorter
    /// than `min_history`; in that case the model must not be invoked.
    pub fn prepare_window(
        &self,
        reading: &Reading,
        history: &[Reading],
    ) -> Result<FeatureWindow, ModelStatus> {
        let required = self.config.min_history;
        if history.len() < required {
            return Err(ModelStatus::Skipped {
                available: history.len(),
                required,
            });
        }

        // Only the tail can land in the window, so avoid cloning the rest.
        let keep = self.config.window_length.saturating_sub(1).min(history.len());
        let mut tail: Vec<Reading> = history[history.len() - keep..].to_vec();
        tail.push(reading.clone());

        build_window(&tail, self.config.window_length).map_err(|err| {
            log_debug!("window unavailable for {}: {}", reading.patient_id, err);
            ModelStatus::Skipped {
                available: history.len(),
                required: self.config.window_length.saturating_sub(1).max(required),
            }
        })
    }

    /// Invokes the model, degrading any failure to `ModelStatus::Failed`.
    pub fn score_window(&self, patient_id: &str, window: &FeatureWindow) -> ModelStatus {
        match checked_score(self.model.as_ref(), window) {
            Ok(score) => ModelStatus::Scored { score },
            Err(err) => {
                log_warn!(
                    "sequence model '{}' failed for patient {}: {}; using rule score only",
                    self.model.name(),
                    patient_id,
                    err
                );
                ModelStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Linear fusion of the two components followed by the `[0, 1]` clamp.
    pub fn fuse(&self, rule: RuleScore, model: ModelStatus) -> RiskAssessment {
        let fused = match model.score() {
            Some(model_score) => {
                self.config.rule_weight * rule.score + self.config.model_weight * model_score
            }
            None => rule.score,
        };

        RiskAssessment {
            risk_score: fused.clamp(0.0, 1.0),
            explanation: rule.labels,
            rule_score: rule.score,
            model,
            bias_flagged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vital;
    use crate::scoring::model::ModelError;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        score: f64,
    }

    impl SequenceRiskModel for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn score(&self, _window: &FeatureWindow) -> Result<f64, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.score)
        }
    }

    struct Broken;

    impl SequenceRiskModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn score(&self, _window: &FeatureWindow) -> Result<f64, ModelError> {
            Err(ModelError::Failed("backend unavailable".into()))
        }
    }

    fn normal(minute: i64) -> Reading {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        Reading::new("P001", start + Duration::minutes(minute))
            .with_vital(Vital::HeartRate, 75.0)
            .with_vital(Vital::BloodGlucose, 110.0)
            .with_vital(Vital::Spo2, 98.0)
    }

    fn counting(score: f64) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            score,
        })
    }

    #[test]
    fn model_not_invoked_below_minimum_history() {
        let model = counting(0.9);
        let scorer = RiskScorer::new(ScoringConfig::default(), model.clone());
        let history: Vec<Reading> = (0..9).map(normal).collect();
        let assessment = scorer.assess(&normal(9), &history);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(assessment.risk_score, 0.0);
        assert_eq!(
            assessment.model,
            ModelStatus::Skipped { available: 9, required: 10 }
        );
    }

    #[test]
    fn fuses_rule_and_model_scores() {
        let model = counting(0.5);
        let scorer = RiskScorer::new(ScoringConfig::default(), model.clone());
        let history: Vec<Reading> = (0..10).map(normal).collect();
        let reading = normal(10).with_vital(Vital::HeartRate, 120.0);
        let assessment = scorer.assess(&reading, &history);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!((assessment.risk_score - (0.7 * 0.3 + 0.3 * 0.5)).abs() < 1e-12);
        assert_eq!(assessment.model.score(), Some(0.5));
    }

    #[test]
    fn model_failure_degrades_to_rule_score() {
        let scorer = RiskScorer::new(ScoringConfig::default(), Arc::new(Broken));
        let history: Vec<Reading> = (0..12).map(normal).collect();
        let reading = normal(12).with_vital(Vital::BloodGlucose, 60.0);
        let assessment = scorer.assess(&reading, &history);
        assert!((assessment.risk_score - 0.5).abs() < 1e-12);
        assert!(matches!(assessment.model, ModelStatus::Failed { .. }));
    }

    #[test]
    fn clamps_uncapped_rule_sum() {
        let scorer = RiskScorer::default();
        let reading = normal(0)
            .with_vital(Vital::HeartRate, 130.0)
            .with_vital(Vital::BloodGlucose, 50.0)
            .with_vital(Vital::Spo2, 88.0);
        let assessment = scorer.assess(&reading, &[]);
        assert!((assessment.rule_score - 1.1).abs() < 1e-12);
        assert_eq!(assessment.risk_score, 1.0);
    }

    #[test]
    fn window_ends_at_the_scored_reading() {
        struct LatestHeartRate;
        impl SequenceRiskModel for LatestHeartRate {
            fn name(&self) -> &str {
                "latest-hr"
            }
            fn score(&self, window: &FeatureWindow) -> Result<f64, ModelError> {
                let latest = window.latest().ok_or_else(|| ModelError::Failed("empty".into()))?;
                Ok(if latest[Vital::HeartRate.index()] > 2.0 { 1.0 } else { 0.0 })
            }
        }

        let scorer = RiskScorer::new(ScoringConfig::default(), Arc::new(LatestHeartRate));
        let history: Vec<Reading> = (0..20).map(normal).collect();
        let spike = normal(20).with_vital(Vital::HeartRate, 99.0);
        let assessment = scorer.assess(&spike, &history);
        assert_eq!(assessment.model.score(), Some(1.0));
    }
}
