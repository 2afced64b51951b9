use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::models::AlertTier;

// Set to true to log record writer activity
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Minimal per-reading telemetry tuple handed to downstream collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub id: String,
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    pub risk_score: f64,
    pub alert_tier: AlertTier,
}

/// Receives one record per ingested reading, after the session is updated.
///
/// Called while the patient's session is locked, so records for a single
/// patient arrive in ingestion order. Implementations must not block.
pub trait RiskObserver: Send + Sync {
    fn observe(&self, record: &RiskRecord);
}

/// Persists risk records to the database from a background task.
///
/// `observe` only enqueues; write failures are logged and never reach the
/// ingestion path.
pub struct RecordStore {
    tx: mpsc::UnboundedSender<RiskRecord>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RecordStore {
    /// Spawns the writer task; must be called from within a tokio runtime.
    pub fn start(db: Database) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(writer_loop(db, rx, cancel_token.clone()));

        Self {
            tx,
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Writes everything already queued, then stops the writer task.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_token.cancel();

        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(handle) = handle {
            handle.await.context("record writer task failed to join")?;
        }
        Ok(())
    }
}

impl RiskObserver for RecordStore {
    fn observe(&self, record: &RiskRecord) {
        if self.tx.send(record.clone()).is_err() {
            log_error!(
                "Record writer stopped; dropping risk record for patient {} at {}",
                record.patient_id, record.timestamp
            );
        }
    }
}

async fn writer_loop(
    db: Database,
    mut rx: mpsc::UnboundedReceiver<RiskRecord>,
    cancel_token: CancellationToken,
) {
    let mut written = 0usize;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                while let Ok(record) = rx.try_recv() {
                    written += persist(&db, record).await;
                }
                break;
            }
            next = rx.recv() => match next {
                Some(record) => written += persist(&db, record).await,
                None => break,
            },
        }
    }

    log_info!("Record writer stopped after persisting {written} risk records");
}

async fn persist(db: &Database, record: RiskRecord) -> usize {
    match db.insert_risk_record(&record).await {
        Ok(()) => 1,
        Err(err) => {
            log_error!(
                "Failed to persist risk record for patient {} at {}: {err:#}",
                record.patient_id, record.timestamp
            );
            0
        }
    }
}
