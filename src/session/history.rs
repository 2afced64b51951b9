use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::models::Reading;

pub type HistoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Reading>>> + Send + 'a>>;

/// Storage capability used to seed a session on a patient's first reading.
///
/// Implementations return the patient's prior readings ordered by timestamp.
pub trait HistorySource: Send + Sync {
    fn load_history<'a>(&'a self, patient_id: &'a str) -> HistoryFuture<'a>;
}

/// Every patient starts with an empty history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistorySource for NoHistory {
    fn load_history<'a>(&'a self, _patient_id: &'a str) -> HistoryFuture<'a> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Fixed in-memory histories keyed by patient id.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    readings: HashMap<String, Vec<Reading>>,
}

impl StaticHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `readings` by patient, sorting each group by timestamp.
    pub fn from_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        let mut history = Self::new();
        for reading in readings {
            history
                .readings
                .entry(reading.patient_id.clone())
                .or_default()
                .push(reading);
        }
        for group in history.readings.values_mut() {
            group.sort_by_key(|r| r.timestamp);
        }
        history
    }
}

impl HistorySource for StaticHistory {
    fn load_history<'a>(&'a self, patient_id: &'a str) -> HistoryFuture<'a> {
        Box::pin(async move { Ok(self.readings.get(patient_id).cloned().unwrap_or_default()) })
    }
}
