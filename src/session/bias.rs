use crate::models::Reading;

/// Fairness hook evaluated once per reading.
///
/// Returns `true` when no bias is detected. A `false` result only annotates
/// the explanation; the risk score and alert tier are left untouched.
pub trait BiasCheck: Send + Sync {
    fn check_bias(&self, reading: &Reading, history: &[Reading]) -> bool;
}

/// Never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBiasDetected;

impl BiasCheck for NoBiasDetected {
    fn check_bias(&self, _reading: &Reading, _history: &[Reading]) -> bool {
        true
    }
}

impl<F> BiasCheck for F
where
    F: Fn(&Reading, &[Reading]) -> bool + Send + Sync,
{
    fn check_bias(&self, reading: &Reading, history: &[Reading]) -> bool {
        self(reading, history)
    }
}
