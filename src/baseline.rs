//! Per-patient rolling baselines.
//!
//! A baseline is recomputed from the full in-memory history every time it is
//! requested; it is never updated incrementally or merged with an older one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Reading, Vital};

/// Mean and population standard deviation of one vital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalStats {
    pub mean: f64,
    pub std_dev: f64,
    /// Number of non-absent observations the stats were computed from.
    pub count: usize,
}

impl VitalStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            count: values.len(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientBaseline {
    pub patient_id: String,
    /// Only vitals with at least one observation appear here.
    pub vitals: BTreeMap<Vital, VitalStats>,
    /// Number of readings the baseline was computed over.
    pub readings: usize,
}

impl PatientBaseline {
    pub fn get(&self, vital: Vital) -> Option<&VitalStats> {
        self.vitals.get(&vital)
    }

    pub fn is_empty(&self) -> bool {
        self.vitals.is_empty()
    }
}

/// Computes a patient's baseline from their ordered history.
///
/// Pure function of `history`: the same input always yields a bit-identical
/// result because values are summed in history order.
pub fn update(patient_id: &str, history: &[Reading]) -> PatientBaseline {
    let mut vitals = BTreeMap::new();
    let mut values = Vec::with_capacity(history.len());

    for vital in Vital::ALL {
        values.clear();
        values.extend(history.iter().filter_map(|reading| reading.vital(vital)));
        if let Some(stats) = VitalStats::from_values(&values) {
            vitals.insert(vital, stats);
        }
    }

    PatientBaseline {
        patient_id: patient_id.to_string(),
        vitals,
        readings: history.len(),
    }
}
