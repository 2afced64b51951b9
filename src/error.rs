use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced at the ingestion boundary.
///
/// Model failures and short histories never appear here; they degrade to
/// rule-only scoring inside the scorer.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed reading: {0}")]
    MalformedReading(String),

    #[error(
        "reading for patient {patient_id} at {timestamp} is older than the latest accepted reading at {latest}"
    )]
    OutOfOrderReading {
        patient_id: String,
        timestamp: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("failed to load history for patient {patient_id}")]
    History {
        patient_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    pub fn malformed(message: impl Into<String>) -> Self {
        IngestError::MalformedReading(message.into())
    }
}
