use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
};
use crate::models::{Reading, Vital, Vitals};
use crate::session::{HistoryFuture, HistorySource};

const READING_COLUMNS: &str = "patient_id, timestamp, heart_rate, systolic, diastolic, blood_glucose, spo2, sleep_hours, activity_steps, mood, metadata_json";

fn row_to_reading(row: &Row) -> Result<Reading> {
    let timestamp: String = row.get("timestamp")?;
    let metadata_json: Option<String> = row.get("metadata_json")?;

    let metadata = metadata_json
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("failed to parse metadata_json")?;

    Ok(Reading {
        patient_id: row.get("patient_id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        vitals: Vitals {
            heart_rate: row.get("heart_rate")?,
            systolic: row.get("systolic")?,
            diastolic: row.get("diastolic")?,
            blood_glucose: row.get("blood_glucose")?,
            spo2: row.get("spo2")?,
            sleep_hours: row.get("sleep_hours")?,
            activity_steps: row.get("activity_steps")?,
        },
        mood: row.get("mood")?,
        metadata,
    })
}

fn insert(conn: &Connection, reading: &Reading, imported_at: &str) -> Result<()> {
    let metadata_json = reading
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        &format!(
            "INSERT INTO readings ({READING_COLUMNS}, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            reading.patient_id,
            format_datetime(&reading.timestamp),
            reading.vital(Vital::HeartRate),
            reading.vital(Vital::Systolic),
            reading.vital(Vital::Diastolic),
            reading.vital(Vital::BloodGlucose),
            reading.vital(Vital::Spo2),
            reading.vital(Vital::SleepHours),
            reading.vital(Vital::ActivitySteps),
            reading.mood,
            metadata_json,
            imported_at,
        ],
    )
    .with_context(|| format!("failed to insert reading for patient {}", reading.patient_id))?;
    Ok(())
}

impl Database {
    pub async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let reading = reading.clone();
        self.execute(move |conn| insert(conn, &reading, &format_datetime(&Utc::now())))
            .await
    }

    /// Inserts a batch atomically: either every reading lands or none does.
    pub async fn insert_readings(&self, readings: &[Reading]) -> Result<usize> {
        let readings = readings.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let imported_at = format_datetime(&Utc::now());

            for reading in &readings {
                insert(&tx, reading, &imported_at)?;
            }

            tx.commit().context("failed to commit reading import")?;
            Ok(readings.len())
        })
        .await
    }

    /// All stored readings for a patient, oldest first; ties keep insertion order.
    pub async fn load_history(&self, patient_id: &str) -> Result<Vec<Reading>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {READING_COLUMNS}
                 FROM readings
                 WHERE patient_id = ?1
                 ORDER BY timestamp ASC, id ASC"
            ))?;

            let mut rows = stmt.query(params![patient_id])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }
            Ok(readings)
        })
        .await
    }

    pub async fn list_patients(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT patient_id FROM readings ORDER BY patient_id")?;
            let patients = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(patients)
        })
        .await
    }
}

impl HistorySource for Database {
    fn load_history<'a>(&'a self, patient_id: &'a str) -> HistoryFuture<'a> {
        Box::pin(Database::load_history(self, patient_id))
    }
}
