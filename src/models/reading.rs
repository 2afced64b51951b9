//! Reading data model.
//!
//! A `Reading` is one timestamped snapshot of a patient's vitals. Vitals that
//! were not measured stay `None`; they are never coerced to zero here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IngestError;

/// The seven numeric vitals the engine understands, in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vital {
    HeartRate,
    Systolic,
    Diastolic,
    BloodGlucose,
    Spo2,
    SleepHours,
    ActivitySteps,
}

impl Vital {
    /// Feature order used by the sequence windower.
    pub const ALL: [Vital; 7] = [
        Vital::HeartRate,
        Vital::Systolic,
        Vital::Diastolic,
        Vital::BloodGlucose,
        Vital::Spo2,
        Vital::SleepHours,
        Vital::ActivitySteps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vital::HeartRate => "heart_rate",
            Vital::Systolic => "systolic",
            Vital::Diastolic => "diastolic",
            Vital::BloodGlucose => "blood_glucose",
            Vital::Spo2 => "spo2",
            Vital::SleepHours => "sleep_hours",
            Vital::ActivitySteps => "activity_steps",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Vital::HeartRate => 0,
            Vital::Systolic => 1,
            Vital::Diastolic => 2,
            Vital::BloodGlucose => 3,
            Vital::Spo2 => 4,
            Vital::SleepHours => 5,
            Vital::ActivitySteps => 6,
        }
    }
}

impl std::fmt::Display for Vital {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional vitals carried by a reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub heart_rate: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub blood_glucose: Option<f64>,
    pub spo2: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub activity_steps: Option<f64>,
}

impl Vitals {
    pub fn get(&self, vital: Vital) -> Option<f64> {
        match vital {
            Vital::HeartRate => self.heart_rate,
            Vital::Systolic => self.systolic,
            Vital::Diastolic => self.diastolic,
            Vital::BloodGlucose => self.blood_glucose,
            Vital::Spo2 => self.spo2,
            Vital::SleepHours => self.sleep_hours,
            Vital::ActivitySteps => self.activity_steps,
        }
    }

    fn slot(&mut self, vital: Vital) -> &mut Option<f64> {
        match vital {
            Vital::HeartRate => &mut self.heart_rate,
            Vital::Systolic => &mut self.systolic,
            Vital::Diastolic => &mut self.diastolic,
            Vital::BloodGlucose => &mut self.blood_glucose,
            Vital::Spo2 => &mut self.spo2,
            Vital::SleepHours => &mut self.sleep_hours,
            Vital::ActivitySteps => &mut self.activity_steps,
        }
    }

    /// Present vitals in feature order.
    pub fn present(&self) -> impl Iterator<Item = (Vital, f64)> + '_ {
        Vital::ALL
            .into_iter()
            .filter_map(move |vital| self.get(vital).map(|value| (vital, value)))
    }
}

/// One timestamped set of vitals for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    pub vitals: Vitals,
    pub mood: Option<String>,
    pub metadata: Option<Value>,
}

impl Reading {
    pub fn new(patient_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            patient_id: patient_id.into(),
            timestamp,
            vitals: Vitals::default(),
            mood: None,
            metadata: None,
        }
    }

    pub fn with_vital(mut self, vital: Vital, value: f64) -> Self {
        *self.vitals.slot(vital) = Some(value);
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn vital(&self, vital: Vital) -> Option<f64> {
        self.vitals.get(vital)
    }

    /// Rejects readings that would silently corrupt baseline statistics.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.patient_id.trim().is_empty() {
            return Err(IngestError::malformed("patient_id is blank"));
        }
        for (vital, value) in self.vitals.present() {
            if !value.is_finite() {
                return Err(IngestError::malformed(format!(
                    "{vital} is not a finite number ({value})"
                )));
            }
        }
        Ok(())
    }
}

/// Blood pressure as nested by older exports (`"vitals": {"systolic": ..}`).
#[derive(Debug, Clone, Default, Deserialize)]
struct RawPressure {
    #[serde(default)]
    systolic: Option<Value>,
    #[serde(default)]
    diastolic: Option<Value>,
}

/// Lenient wire shape accepted at the ingestion boundary.
///
/// Values are kept as raw JSON so type errors can be reported as
/// `MalformedReading` with the offending field named.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub patient_id: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    heart_rate: Option<Value>,
    #[serde(default)]
    systolic: Option<Value>,
    #[serde(default)]
    diastolic: Option<Value>,
    #[serde(default)]
    blood_glucose: Option<Value>,
    #[serde(default)]
    spo2: Option<Value>,
    #[serde(default, alias = "sleep")]
    sleep_hours: Option<Value>,
    #[serde(default, alias = "activity")]
    activity_steps: Option<Value>,
    #[serde(default)]
    vitals: Option<RawPressure>,
    #[serde(default)]
    mood: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
}

fn numeric_field(name: &str, value: Option<&Value>) -> Result<Option<f64>, IngestError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| IngestError::malformed(format!("{name} is not a finite number"))),
        Some(other) => Err(IngestError::malformed(format!(
            "{name} must be a number, got {other}"
        ))),
    }
}

/// Parses RFC 3339, falling back to a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|err| IngestError::malformed(format!("invalid timestamp '{raw}': {err}")))
}

impl TryFrom<RawReading> for Reading {
    type Error = IngestError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        let patient_id = match raw.patient_id {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(IngestError::malformed("missing required field patient_id"))
            }
            Some(other) => {
                return Err(IngestError::malformed(format!(
                    "patient_id must be a string, got {other}"
                )))
            }
        };

        let timestamp = match raw.timestamp {
            Some(Value::String(ts)) => parse_timestamp(&ts)?,
            None | Some(Value::Null) => {
                return Err(IngestError::malformed("missing required field timestamp"))
            }
            Some(other) => {
                return Err(IngestError::malformed(format!(
                    "timestamp must be a string, got {other}"
                )))
            }
        };

        let pressure = raw.vitals.unwrap_or_default();
        let vitals = Vitals {
            heart_rate: numeric_field("heart_rate", raw.heart_rate.as_ref())?,
            systolic: numeric_field(
                "systolic",
                raw.systolic.as_ref().or(pressure.systolic.as_ref()),
            )?,
            diastolic: numeric_field(
                "diastolic",
                raw.diastolic.as_ref().or(pressure.diastolic.as_ref()),
            )?,
            blood_glucose: numeric_field("blood_glucose", raw.blood_glucose.as_ref())?,
            spo2: numeric_field("spo2", raw.spo2.as_ref())?,
            sleep_hours: numeric_field("sleep_hours", raw.sleep_hours.as_ref())?,
            activity_steps: numeric_field("activity_steps", raw.activity_steps.as_ref())?,
        };

        let mood = match raw.mood {
            None | Some(Value::Null) => None,
            Some(Value::String(mood)) => Some(mood),
            Some(other) => {
                return Err(IngestError::malformed(format!(
                    "mood must be a string, got {other}"
                )))
            }
        };

        Ok(Reading {
            patient_id,
            timestamp,
            vitals,
            mood,
            metadata: raw.metadata.filter(|m| !m.is_null()),
        })
    }
}

/// Parses a JSON array or newline-delimited JSON into validated readings.
///
/// The batch is rejected on the first malformed record.
pub fn parse_readings(input: &str) -> Result<Vec<Reading>, IngestError> {
    let trimmed = input.trim_start_matches('\u{feff}').trim_start();
    let raws: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|err| IngestError::malformed(format!("invalid JSON array: {err}")))?
    } else {
        // A stream of whitespace-separated values covers NDJSON and a single
        // pretty-printed object alike.
        serde_json::Deserializer::from_str(trimmed)
            .into_iter::<Value>()
            .enumerate()
            .map(|(index, value)| {
                value.map_err(|err| {
                    IngestError::malformed(format!("record {index}: invalid JSON: {err}"))
                })
            })
            .collect::<Result<_, _>>()?
    };

    raws.into_iter()
        .enumerate()
        .map(|(index, value)| {
            if !value.is_object() {
                return Err(IngestError::malformed(format!(
                    "record {index}: each record must be an object"
                )));
            }
            let raw: RawReading = serde_json::from_value(value).map_err(|err| {
                IngestError::malformed(format!("record {index}: {err}"))
            })?;
            Reading::try_from(raw).map_err(|err| match err {
                IngestError::MalformedReading(msg) => {
                    IngestError::malformed(format!("record {index}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}
