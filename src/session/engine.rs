use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{Alert, ModelStatus, Reading, RiskAssessment};
use crate::scoring::{classify_with, AlertConfig, FeatureWindow, ModelError, RiskScorer};

use super::bias::{BiasCheck, NoBiasDetected};
use super::history::{HistorySource, NoHistory};
use super::observer::{RiskObserver, RiskRecord};
use super::state::{PatientSession, SessionSnapshot};

// Set to true to enable per-reading logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// What to do with a reading older than the session's latest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Apply it in arrival order and mark the entry as out of order.
    #[default]
    AcceptFlagged,
    /// Refuse it with `IngestError::OutOfOrderReading`.
    Reject,
}

/// When the patient baseline is recomputed from history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineRefresh {
    /// Before scoring every reading, over all prior readings.
    #[default]
    EveryReading,
    /// Once, from the history available at the first reading.
    FirstReading,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOptions {
    pub alerts: AlertConfig,
    pub ordering: OrderingPolicy,
    pub baseline_refresh: BaselineRefresh,
    /// Deadline for one sequence-model call. `None` runs the model inline.
    pub model_timeout: Option<Duration>,
}

/// Result of ingesting one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub assessment: RiskAssessment,
    pub alert: Alert,
    pub record: RiskRecord,
    pub out_of_order: bool,
}

/// `None` until the session has been seeded from the history source.
type SessionSlot = Arc<Mutex<Option<PatientSession>>>;

struct EngineInner {
    scorer: RiskScorer,
    options: EngineOptions,
    history: Arc<dyn HistorySource>,
    bias: Arc<dyn BiasCheck>,
    observers: Vec<Arc<dyn RiskObserver>>,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

pub struct EngineBuilder {
    scorer: RiskScorer,
    options: EngineOptions,
    history: Arc<dyn HistorySource>,
    bias: Arc<dyn BiasCheck>,
    observers: Vec<Arc<dyn RiskObserver>>,
}

impl EngineBuilder {
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = history;
        self
    }

    pub fn bias_check(mut self, bias: Arc<dyn BiasCheck>) -> Self {
        self.bias = bias;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RiskObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> MonitorEngine {
        MonitorEngine {
            inner: Arc::new(EngineInner {
                scorer: self.scorer,
                options: self.options,
                history: self.history,
                bias: self.bias,
                observers: self.observers,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// Per-patient risk engine.
///
/// Cloning is cheap and clones share sessions. Each patient's readings are
/// applied one at a time under that patient's lock; different patients
/// never contend beyond the brief registry lookup.
#[derive(Clone)]
pub struct MonitorEngine {
    inner: Arc<EngineInner>,
}

impl MonitorEngine {
    pub fn builder(scorer: RiskScorer) -> EngineBuilder {
        EngineBuilder {
            scorer,
            options: EngineOptions::default(),
            history: Arc::new(NoHistory),
            bias: Arc::new(NoBiasDetected),
            observers: Vec::new(),
        }
    }

    pub fn new(scorer: RiskScorer) -> Self {
        Self::builder(scorer).build()
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.inner.scorer
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Scores `reading`, appends it to its patient's session, and notifies
    /// observers.
    pub async fn ingest_reading(&self, reading: Reading) -> Result<IngestOutcome, IngestError> {
        reading.validate()?;

        let slot = self.slot(&reading.patient_id).await;
        let mut guard = slot.lock().await;

        if guard.is_none() {
            let prior = self
                .inner
                .history
                .load_history(&reading.patient_id)
                .await
                .map_err(|source| IngestError::History {
                    patient_id: reading.patient_id.clone(),
                    source,
                })?;
            log_info!(
                "Opened session for patient {} with {} stored readings",
                reading.patient_id,
                prior.len()
            );
            *guard = Some(PatientSession::seeded(reading.patient_id.clone(), prior));
        }

        let session =
            guard.get_or_insert_with(|| PatientSession::new(reading.patient_id.clone()));

        let out_of_order = session.is_out_of_order(&reading);
        if out_of_order {
            let latest = session.latest_at().unwrap_or(reading.timestamp);
            match self.inner.options.ordering {
                OrderingPolicy::Reject => {
                    return Err(IngestError::OutOfOrderReading {
                        patient_id: reading.patient_id.clone(),
                        timestamp: reading.timestamp,
                        latest,
                    });
                }
                OrderingPolicy::AcceptFlagged => {
                    log_warn!(
                        "Out-of-order reading for patient {}: {} is older than {}",
                        reading.patient_id,
                        reading.timestamp,
                        latest
                    );
                }
            }
        }

        match self.inner.options.baseline_refresh {
            BaselineRefresh::EveryReading => {
                session.refresh_baseline();
            }
            BaselineRefresh::FirstReading => {
                if session.baseline().is_none() {
                    session.refresh_baseline();
                }
            }
        }

        let scorer = &self.inner.scorer;
        let rule = scorer.rule_component(&reading, session.baseline());
        let model = match scorer.prepare_window(&reading, session.history()) {
            Ok(window) => self.run_model(&reading.patient_id, window).await,
            Err(skipped) => skipped,
        };
        let mut assessment = scorer.fuse(rule, model);

        if !self.inner.bias.check_bias(&reading, session.history()) {
            log_warn!(
                "Bias check failed for patient {} at {}",
                reading.patient_id,
                reading.timestamp
            );
            assessment = assessment.flag_bias();
        }

        let alert = classify_with(
            &self.inner.options.alerts,
            assessment.risk_score,
            &assessment.explanation_text(),
            reading.timestamp,
        );

        let record = RiskRecord {
            id: Uuid::new_v4().to_string(),
            patient_id: reading.patient_id.clone(),
            timestamp: reading.timestamp,
            risk_score: assessment.risk_score,
            alert_tier: alert.tier,
        };

        log_debug!(
            "Patient {} at {}: risk {:.3} ({})",
            record.patient_id,
            record.timestamp,
            record.risk_score,
            record.alert_tier
        );

        session.record(reading, assessment.clone(), alert.clone(), out_of_order);

        for observer in &self.inner.observers {
            observer.observe(&record);
        }

        Ok(IngestOutcome {
            assessment,
            alert,
            record,
            out_of_order,
        })
    }

    /// Read-only copy of a patient's session, if one has been opened.
    pub async fn get_session(&self, patient_id: &str) -> Option<SessionSnapshot> {
        let slot = {
            let sessions = self.inner.sessions.lock().await;
            sessions.get(patient_id).cloned()
        }?;
        let guard = slot.lock().await;
        guard.as_ref().map(PatientSession::snapshot)
    }

    /// Ids of patients with an open session, sorted.
    pub async fn patients(&self) -> Vec<String> {
        let slots: Vec<(String, SessionSlot)> = {
            let sessions = self.inner.sessions.lock().await;
            sessions
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };

        let mut ids = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            if slot.lock().await.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    async fn slot(&self, patient_id: &str) -> SessionSlot {
        let mut sessions = self.inner.sessions.lock().await;
        sessions
            .entry(patient_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    async fn run_model(&self, patient_id: &str, window: FeatureWindow) -> ModelStatus {
        let Some(deadline) = self.inner.options.model_timeout else {
            return self.inner.scorer.score_window(patient_id, &window);
        };

        let scorer = self.inner.scorer.clone();
        let owned_id = patient_id.to_string();
        let task = tokio::task::spawn_blocking(move || scorer.score_window(&owned_id, &window));

        let failure = match tokio::time::timeout(deadline, task).await {
            Ok(Ok(status)) => return status,
            Ok(Err(join_err)) => ModelError::Panicked(join_err.to_string()),
            Err(_) => ModelError::TimedOut(deadline.as_millis() as u64),
        };

        log_warn!(
            "sequence model '{}' failed for patient {}: {}; using rule score only",
            self.inner.scorer.model().name(),
            patient_id,
            failure
        );
        ModelStatus::Failed {
            reason: failure.to_string(),
        }
    }
}
