use crate::baseline::PatientBaseline;
use crate::models::Reading;
use crate::scoring::config::{Direction, ThresholdMode, VitalRule};

/// Rule-based component of an assessment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleScore {
    /// Uncapped sum of triggered penalties.
    pub score: f64,
    /// Labels of triggered rules, in rule-table order.
    pub labels: Vec<String>,
}

/// Cutoff for `rule`, personalized from `baseline` when the mode allows it.
pub fn effective_cutoff(
    rule: &VitalRule,
    mode: ThresholdMode,
    baseline: Option<&PatientBaseline>,
) -> f64 {
    let ThresholdMode::Personalized { k, min_samples } = mode else {
        return rule.cutoff;
    };

    let Some(stats) = baseline.and_then(|b| b.get(rule.vital)) else {
        return rule.cutoff;
    };

    if stats.count < min_samples || stats.std_dev <= 0.0 || !k.is_finite() {
        return rule.cutoff;
    }

    let spread = k.abs() * stats.std_dev;
    match rule.direction {
        Direction::Above => stats.mean + spread,
        Direction::Below => stats.mean - spread,
    }
}

fn triggers(rule: &VitalRule, value: f64, cutoff: f64) -> bool {
    match rule.direction {
        Direction::Above => value > cutoff,
        Direction::Below => value < cutoff,
    }
}

/// Sums penalties of every rule whose vital is present and out of range.
///
/// Absent vitals never trigger. Each rule is independent of the others.
pub fn evaluate(
    rules: &[VitalRule],
    mode: ThresholdMode,
    reading: &Reading,
    baseline: Option<&PatientBaseline>,
) -> RuleScore {
    let mut result = RuleScore::default();

    for rule in rules {
        let Some(value) = reading.vital(rule.vital) else {
            continue;
        };
        let cutoff = effective_cutoff(rule, mode, baseline);
        if triggers(rule, value, cutoff) {
            result.score += rule.penalty.max(0.0);
            result.labels.push(rule.label.clone());
        }
    }

    result
}
