use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_usize},
};
use crate::models::AlertTier;
use crate::session::{RiskRecord, TierCounts};

/// A persisted `RiskRecord` with the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRiskRecord {
    #[serde(flatten)]
    pub record: RiskRecord,
    pub recorded_at: DateTime<Utc>,
}

fn row_to_record(row: &Row) -> Result<StoredRiskRecord> {
    let timestamp: String = row.get("timestamp")?;
    let recorded_at: String = row.get("recorded_at")?;
    let tier: String = row.get("alert_tier")?;

    Ok(StoredRiskRecord {
        record: RiskRecord {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            timestamp: parse_datetime(&timestamp, "timestamp")?,
            risk_score: row.get("risk_score")?,
            alert_tier: AlertTier::parse(&tier)
                .ok_or_else(|| anyhow!("unknown alert tier {tier}"))?,
        },
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

impl Database {
    pub async fn insert_risk_record(&self, record: &RiskRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO risk_records (id, patient_id, timestamp, risk_score, alert_tier, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.patient_id,
                    format_datetime(&record.timestamp),
                    record.risk_score,
                    record.alert_tier.as_str(),
                    format_datetime(&Utc::now()),
                ],
            )
            .with_context(|| format!("failed to insert risk record {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Records ordered by reading timestamp, optionally for one patient.
    pub async fn list_risk_records(&self, patient_id: Option<&str>) -> Result<Vec<StoredRiskRecord>> {
        let patient_id = patient_id.map(str::to_string);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, patient_id, timestamp, risk_score, alert_tier, recorded_at
                 FROM risk_records
                 WHERE ?1 IS NULL OR patient_id = ?1
                 ORDER BY patient_id ASC, timestamp ASC, recorded_at ASC",
            )?;

            let mut rows = stmt.query(params![patient_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn tier_counts(&self, patient_id: Option<&str>) -> Result<TierCounts> {
        let patient_id = patient_id.map(str::to_string);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT alert_tier, COUNT(*)
                 FROM risk_records
                 WHERE ?1 IS NULL OR patient_id = ?1
                 GROUP BY alert_tier",
            )?;

            let mut rows = stmt.query(params![patient_id])?;
            let mut counts = TierCounts::default();
            while let Some(row) = rows.next()? {
                let tier: String = row.get(0)?;
                let count = to_usize(row.get::<_, i64>(1)?, "count")?;
                match AlertTier::parse(&tier) {
                    Some(AlertTier::None) => counts.none = count,
                    Some(AlertTier::Mild) => counts.mild = count,
                    Some(AlertTier::Severe) => counts.severe = count,
                    None => return Err(anyhow!("unknown alert tier {tier}")),
                }
            }
            Ok(counts)
        })
        .await
    }
}
