pub mod alert;
pub mod config;
pub mod model;
pub mod rules;
pub mod scorer;
pub mod window;

pub use alert::{classify, classify_with, AlertConfig};
pub use config::{default_rules, Direction, ScoringConfig, ThresholdMode, VitalRule};
pub use model::{checked_score, LogisticTrendModel, ModelError, SequenceRiskModel};
pub use rules::RuleScore;
pub use scorer::RiskScorer;
pub use window::{build_window, FeatureRow, FeatureWindow, WindowError, FEATURE_COUNT};
