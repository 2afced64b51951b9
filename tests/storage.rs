use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use vitalwatch_lib::db::Database;
use vitalwatch_lib::models::{parse_readings, AlertTier, ModelStatus, Reading, Vital};
use vitalwatch_lib::scoring::RiskScorer;
use vitalwatch_lib::session::{MonitorEngine, RecordStore, RiskObserver, RiskRecord};

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minute)
}

fn open(dir: &tempfile::TempDir) -> Database {
    Database::new(dir.path().join("vitalwatch.sqlite3")).expect("open database")
}

#[tokio::test]
async fn readings_round_trip_with_absent_vitals() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);

    let sparse = Reading::new("P001", at(1))
        .with_vital(Vital::BloodGlucose, 60.0)
        .with_mood("tired")
        .with_metadata(json!({"device": "cgm-2"}));
    let full = Reading::new("P001", at(0))
        .with_vital(Vital::HeartRate, 72.0)
        .with_vital(Vital::Systolic, 120.0)
        .with_vital(Vital::Diastolic, 80.0)
        .with_vital(Vital::Spo2, 0.0);

    db.insert_reading(&sparse).await.unwrap();
    db.insert_reading(&full).await.unwrap();

    let history = db.load_history("P001").await.unwrap();
    assert_eq!(history, vec![full, sparse]);
    assert_eq!(history[0].vital(Vital::Spo2), Some(0.0));
    assert_eq!(history[1].vital(Vital::HeartRate), None);
}

#[tokio::test]
async fn sub_microsecond_timestamps_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);

    let first = Reading::new("P001", at(0) + Duration::nanoseconds(500))
        .with_vital(Vital::HeartRate, 70.0);
    let second = Reading::new("P001", at(0) + Duration::nanoseconds(900))
        .with_vital(Vital::HeartRate, 71.0);
    db.insert_reading(&second).await.unwrap();
    db.insert_reading(&first).await.unwrap();

    let history = db.load_history("P001").await.unwrap();
    assert_eq!(history, vec![first, second]);
}

#[tokio::test]
async fn bulk_import_lists_patients() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);

    let input = r#"
        {"patient_id": "P002", "timestamp": "2024-03-01T08:00:00Z", "heart_rate": 88}
        {"patient_id": "P001", "timestamp": "2024-03-01 08:05:00", "sleep": 6.5, "activity": 4000}
    "#;
    let readings = parse_readings(input).unwrap();
    assert_eq!(db.insert_readings(&readings).await.unwrap(), 2);

    assert_eq!(db.list_patients().await.unwrap(), vec!["P001", "P002"]);
    let p1 = db.load_history("P001").await.unwrap();
    assert_eq!(p1[0].vital(Vital::SleepHours), Some(6.5));
    assert_eq!(p1[0].vital(Vital::ActivitySteps), Some(4000.0));
}

#[tokio::test]
async fn risk_records_are_listed_and_counted() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);

    let tiers = [AlertTier::None, AlertTier::Severe, AlertTier::Mild, AlertTier::Severe];
    for (i, tier) in tiers.iter().enumerate() {
        let patient = if i % 2 == 0 { "P001" } else { "P002" };
        db.insert_risk_record(&RiskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient.to_string(),
            timestamp: at(i as i64),
            risk_score: 0.2 * i as f64,
            alert_tier: *tier,
        })
        .await
        .unwrap();
    }

    let all = db.list_risk_records(None).await.unwrap();
    assert_eq!(all.len(), 4);
    let p2 = db.list_risk_records(Some("P002")).await.unwrap();
    assert!(p2.iter().all(|r| r.record.alert_tier == AlertTier::Severe));

    let counts = db.tier_counts(None).await.unwrap();
    assert_eq!((counts.none, counts.mild, counts.severe), (1, 1, 2));
    assert_eq!(db.tier_counts(Some("P001")).await.unwrap().severe, 0);
}

#[tokio::test]
async fn engine_seeds_from_database_and_persists_records() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);

    let prior: Vec<Reading> = (0..10)
        .map(|m| {
            Reading::new("P001", at(m))
                .with_vital(Vital::HeartRate, 70.0 + m as f64)
                .with_vital(Vital::Spo2, 98.0)
        })
        .collect();
    db.insert_readings(&prior).await.unwrap();

    let store = Arc::new(RecordStore::start(db.clone()));
    let engine = MonitorEngine::builder(RiskScorer::default())
        .history(Arc::new(db.clone()))
        .observer(store.clone())
        .build();

    let outcome = engine
        .ingest_reading(
            Reading::new("P001", at(10))
                .with_vital(Vital::HeartRate, 104.0)
                .with_vital(Vital::Spo2, 93.0),
        )
        .await
        .unwrap();
    assert!(matches!(outcome.assessment.model, ModelStatus::Scored { .. }));

    store.shutdown().await.unwrap();

    let stored = db.list_risk_records(Some("P001")).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record, outcome.record);
}

#[tokio::test]
async fn record_store_logs_failed_writes_and_keeps_going() {
    let tmp = tempfile::tempdir().unwrap();
    let db = open(&tmp);
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER reject_severe BEFORE INSERT ON risk_records
             WHEN NEW.alert_tier = 'severe'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    let store = RecordStore::start(db.clone());
    for (minute, tier) in [(0, AlertTier::Severe), (1, AlertTier::Mild)] {
        store.observe(&RiskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: "P001".to_string(),
            timestamp: at(minute),
            risk_score: 0.5,
            alert_tier: tier,
        });
    }
    store.shutdown().await.unwrap();

    let stored = db.list_risk_records(Some("P001")).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record.alert_tier, AlertTier::Mild);
}

#[tokio::test]
async fn reopening_keeps_schema_and_data() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let db = open(&tmp);
        db.insert_reading(&Reading::new("P001", at(0)).with_vital(Vital::HeartRate, 70.0))
            .await
            .unwrap();
    }

    let db = open(&tmp);
    assert_eq!(db.load_history("P001").await.unwrap().len(), 1);
}
