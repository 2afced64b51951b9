use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::{self, PatientBaseline};
use crate::models::{Alert, AlertTier, Reading, RiskAssessment};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Empty,
    Active,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Empty
    }
}

/// One accepted reading with the assessment and alert derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub reading: Reading,
    pub assessment: RiskAssessment,
    pub alert: Alert,
    /// Timestamp was earlier than the latest reading already in the session.
    pub out_of_order: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierCounts {
    pub none: usize,
    pub mild: usize,
    pub severe: usize,
}

impl TierCounts {
    pub fn bump(&mut self, tier: AlertTier) {
        match tier {
            AlertTier::None => self.none += 1,
            AlertTier::Mild => self.mild += 1,
            AlertTier::Severe => self.severe += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.none + self.mild + self.severe
    }
}

/// Aggregate view of a session for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub patient_id: String,
    pub readings: usize,
    pub tiers: TierCounts,
    pub mean_risk: Option<f64>,
    pub max_risk: Option<f64>,
    pub escalations: usize,
    pub out_of_order: usize,
    pub latest_at: Option<DateTime<Utc>>,
}

/// Read-only copy of a session handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub patient_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Readings loaded from storage before the first ingested reading.
    pub seeded: usize,
    pub entries: Vec<SessionEntry>,
    pub baseline: Option<PatientBaseline>,
}

/// Append-only history of one patient.
///
/// `history` holds every reading the scorer should see (seeded plus
/// ingested, in arrival order); `entries` holds only the ingested ones,
/// each paired with its assessment and alert.
#[derive(Debug, Clone)]
pub struct PatientSession {
    patient_id: String,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    history: Vec<Reading>,
    seeded: usize,
    entries: Vec<SessionEntry>,
    baseline: Option<PatientBaseline>,
    latest_at: Option<DateTime<Utc>>,
}

impl PatientSession {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            status: SessionStatus::Empty,
            created_at: Utc::now(),
            history: Vec::new(),
            seeded: 0,
            entries: Vec::new(),
            baseline: None,
            latest_at: None,
        }
    }

    /// Session pre-populated with stored history. Stays `Empty` until the
    /// first reading is applied.
    pub fn seeded(patient_id: impl Into<String>, history: Vec<Reading>) -> Self {
        let mut session = Self::new(patient_id);
        session.latest_at = history.iter().map(|r| r.timestamp).max();
        session.seeded = history.len();
        session.history = history;
        session
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn history(&self) -> &[Reading] {
        &self.history
    }

    pub fn baseline(&self) -> Option<&PatientBaseline> {
        self.baseline.as_ref()
    }

    /// Recomputes the baseline from the full history, replacing the old one.
    pub fn refresh_baseline(&mut self) -> &PatientBaseline {
        self.baseline.insert(baseline::update(&self.patient_id, &self.history))
    }

    /// Latest timestamp among accepted readings.
    pub fn latest_at(&self) -> Option<DateTime<Utc>> {
        self.latest_at
    }

    pub fn is_out_of_order(&self, reading: &Reading) -> bool {
        matches!(self.latest_at, Some(latest) if reading.timestamp < latest)
    }

    /// Appends the triple; the only mutation path once a session exists.
    pub fn record(
        &mut self,
        reading: Reading,
        assessment: RiskAssessment,
        alert: Alert,
        out_of_order: bool,
    ) -> &SessionEntry {
        self.status = SessionStatus::Active;
        self.latest_at = Some(match self.latest_at {
            Some(latest) => latest.max(reading.timestamp),
            None => reading.timestamp,
        });
        self.history.push(reading.clone());
        self.entries.push(SessionEntry {
            reading,
            assessment,
            alert,
            out_of_order,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> + '_ {
        self.entries.iter().map(|entry| &entry.alert)
    }

    pub fn latest(&self) -> Option<&SessionEntry> {
        self.entries.last()
    }

    /// Number of ingested readings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        let mut tiers = TierCounts::default();
        let mut total = 0.0;
        let mut max_risk: Option<f64> = None;
        let mut escalations = 0;
        let mut out_of_order = 0;

        for entry in &self.entries {
            tiers.bump(entry.alert.tier);
            let risk = entry.assessment.risk_score;
            total += risk;
            max_risk = Some(max_risk.map_or(risk, |m| m.max(risk)));
            if entry.alert.escalation_needed {
                escalations += 1;
            }
            if entry.out_of_order {
                out_of_order += 1;
            }
        }

        SessionSummary {
            patient_id: self.patient_id.clone(),
            readings: self.entries.len(),
            tiers,
            mean_risk: (!self.entries.is_empty()).then(|| total / self.entries.len() as f64),
            max_risk,
            escalations,
            out_of_order,
            latest_at: self.latest_at,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            patient_id: self.patient_id.clone(),
            status: self.status,
            created_at: self.created_at,
            seeded: self.seeded,
            entries: self.entries.clone(),
            baseline: self.baseline.clone(),
        }
    }
}
