//! Sequence windowing for the risk model.
//!
//! A window is the most recent `window_length` readings, one row per reading
//! and one column per vital in [`Vital::ALL`] order. Absent vitals become 0
//! before normalization; the baseline tracker treats them differently on
//! purpose, so keep the two paths separate.

use thiserror::Error;

use crate::models::{Reading, Vital};

pub const FEATURE_COUNT: usize = 7;

pub type FeatureRow = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("not enough data for a window: need {required} readings, have {available}")]
    NotEnoughData { required: usize, available: usize },
}

/// Normalized `window_length × 7` feature matrix, oldest row first.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    rows: Vec<FeatureRow>,
}

impl FeatureWindow {
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&FeatureRow> {
        self.rows.first()
    }

    /// Row for the newest reading in the window.
    pub fn latest(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    pub fn column(&self, vital: Vital) -> impl Iterator<Item = f64> + '_ {
        let index = vital.index();
        self.rows.iter().map(move |row| row[index])
    }
}

fn raw_row(reading: &Reading) -> FeatureRow {
    let mut row = [0.0; FEATURE_COUNT];
    for vital in Vital::ALL {
        row[vital.index()] = reading.vital(vital).unwrap_or(0.0);
    }
    row
}

/// Standardizes each column in place over the window itself.
///
/// A column with zero spread has unit scale, so every entry becomes 0.
fn standardize(rows: &mut [FeatureRow]) {
    let n = rows.len() as f64;
    for col in 0..FEATURE_COUNT {
        let mean = rows.iter().map(|row| row[col]).sum::<f64>() / n;
        let variance = rows.iter().map(|row| (row[col] - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let scale = if std_dev > 0.0 { std_dev } else { 1.0 };
        for row in rows.iter_mut() {
            row[col] = (row[col] - mean) / scale;
        }
    }
}

/// Builds a normalized window from the tail of `history`.
///
/// The last element of `history` must be the reading being scored. Each call
/// depends on its input alone.
pub fn build_window(history: &[Reading], window_length: usize) -> Result<FeatureWindow, WindowError> {
    if window_length == 0 || history.len() < window_length {
        return Err(WindowError::NotEnoughData {
            required: window_length.max(1),
            available: history.len(),
        });
    }

    let tail = &history[history.len() - window_length..];
    let mut rows: Vec<FeatureRow> = tail.iter().map(raw_row).collect();
    standardize(&mut rows);

    Ok(FeatureWindow { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn history(n: usize) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                Reading::new("P001", start + Duration::minutes(i as i64))
                    .with_vital(Vital::HeartRate, 60.0 + i as f64)
                    .with_vital(Vital::Spo2, 98.0)
            })
            .collect()
    }

    #[test]
    fn rejects_short_history() {
        let err = build_window(&history(9), 10).unwrap_err();
        assert_eq!(err, WindowError::NotEnoughData { required: 10, available: 9 });
    }

    #[test]
    fn window_has_requested_shape() {
        let window = build_window(&history(15), 10).unwrap();
        assert_eq!(window.len(), 10);
        assert!(window.rows().iter().all(|row| row.len() == 7));
    }

    #[test]
    fn selects_most_recent_entries() {
        let mut h = history(15);
        // Distinguish the newest reading so it lands at the top of its column.
        let last = h.pop().unwrap().with_vital(Vital::HeartRate, 200.0);
        h.push(last);
        let window = build_window(&h, 10).unwrap();
        let hr: Vec<f64> = window.column(Vital::HeartRate).collect();
        let max = hr.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(*hr.last().unwrap(), max);
    }

    #[test]
    fn columns_are_standardized_over_the_window() {
        let window = build_window(&history(12), 10).unwrap();
        let hr: Vec<f64> = window.column(Vital::HeartRate).collect();
        let mean = hr.iter().sum::<f64>() / hr.len() as f64;
        let var = hr.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / hr.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn constant_and_absent_columns_become_zero() {
        let window = build_window(&history(10), 10).unwrap();
        assert!(window.column(Vital::Spo2).all(|v| v == 0.0));
        assert!(window.column(Vital::BloodGlucose).all(|v| v == 0.0));
    }

    #[test]
    fn absent_values_are_substituted_with_zero_before_scaling() {
        let mut h = history(10);
        let gap = Reading::new("P001", h[9].timestamp + Duration::minutes(1));
        h.push(gap);
        let window = build_window(&h, 10).unwrap();
        // The gap row carries the lowest heart-rate z-score in the window.
        let hr: Vec<f64> = window.column(Vital::HeartRate).collect();
        let min = hr.iter().cloned().fold(f64::MAX, f64::min);
        assert_eq!(*hr.last().unwrap(), min);
    }

    #[test]
    fn zero_length_is_not_enough_data() {
        assert!(build_window(&history(3), 0).is_err());
    }
}
