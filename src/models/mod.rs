pub mod assessment;
pub mod reading;

pub use assessment::{
    Alert, AlertTier, ModelStatus, RiskAssessment, BIAS_FLAG_SUFFIX, NO_RISK_EXPLANATION,
};
pub use reading::{parse_readings, parse_timestamp, RawReading, Reading, Vital, Vitals};
