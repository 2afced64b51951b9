//! `vitalwatch` command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::db::Database;
use crate::models::{parse_readings, Reading};
use crate::session::{MonitorEngine, RecordStore};
use crate::settings::SettingsStore;

#[derive(Debug, Parser)]
#[clap(name = "vitalwatch", version, about = "Per-patient vital-sign risk scoring and alerting")]
pub struct Cli {
    /// SQLite database holding readings and risk records
    #[clap(long, global = true, env = "VITALWATCH_DB", default_value = "vitalwatch.sqlite3")]
    pub db: PathBuf,

    /// JSON engine settings; defaults are used when the file is absent
    #[clap(long, global = true, env = "VITALWATCH_SETTINGS", default_value = "vitalwatch.settings.json")]
    pub settings: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Validate readings and store them as history without scoring
    Import { file: PathBuf },
    /// Score readings in file order, storing readings and risk records
    Ingest { file: PathBuf },
    /// List stored risk records and tier counts
    Records {
        #[clap(long, short = 'p')]
        patient: Option<String>,
    },
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let db = Database::new(cli.db.clone())?;

    match cli.command {
        Command::Import { file } => import(&db, &file).await,
        Command::Ingest { file } => {
            let settings = SettingsStore::new(cli.settings.clone())?;
            ingest(&db, &settings, &file).await
        }
        Command::Records { patient } => records(&db, patient.as_deref()).await,
    }
}

fn read_file(file: &Path) -> Result<Vec<Reading>> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    parse_readings(&contents).with_context(|| format!("invalid readings in {}", file.display()))
}

async fn import(db: &Database, file: &Path) -> Result<()> {
    let readings = read_file(file)?;
    let inserted = db.insert_readings(&readings).await?;
    info!("Imported {inserted} readings from {}", file.display());
    println!("imported {inserted} readings");
    Ok(())
}

async fn ingest(db: &Database, settings: &SettingsStore, file: &Path) -> Result<()> {
    let readings = read_file(file)?;
    let settings = settings.get();

    let store = Arc::new(RecordStore::start(db.clone()));
    let engine = MonitorEngine::builder(settings.build_scorer()?)
        .options(settings.engine_options())
        .history(Arc::new(db.clone()))
        .observer(store.clone())
        .build();

    let mut failure = None;
    for reading in readings {
        // Sessions are seeded from stored history on first contact, so the
        // reading is stored only after it has been scored.
        let outcome = match engine.ingest_reading(reading.clone()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                failure = Some(anyhow::Error::new(err));
                break;
            }
        };
        if let Err(err) = db.insert_reading(&reading).await {
            failure = Some(err);
            break;
        }

        println!(
            "{}\t{}\t{:.3}\t{}\t{}{}",
            outcome.record.patient_id,
            outcome.record.timestamp.to_rfc3339(),
            outcome.record.risk_score,
            outcome.record.alert_tier,
            outcome.alert.message,
            if outcome.out_of_order { "\t[out of order]" } else { "" }
        );
    }

    // Records of already scored readings are queued in the store; flush them
    // before reporting any failure.
    let flushed = store.shutdown().await;

    for patient in engine.patients().await {
        if let Some(snapshot) = engine.get_session(&patient).await {
            info!(
                "Patient {patient}: {} readings scored, {} stored beforehand",
                snapshot.entries.len(),
                snapshot.seeded
            );
        }
    }

    match failure {
        Some(err) => Err(err.context("ingestion stopped")),
        None => flushed,
    }
}

async fn records(db: &Database, patient: Option<&str>) -> Result<()> {
    let records = db.list_risk_records(patient).await?;
    for stored in &records {
        let record = &stored.record;
        println!(
            "{}\t{}\t{:.3}\t{}",
            record.patient_id,
            record.timestamp.to_rfc3339(),
            record.risk_score,
            record.alert_tier
        );
    }

    let counts = db.tier_counts(patient).await?;
    println!(
        "total {}: none {}, mild {}, severe {}",
        counts.total(),
        counts.none,
        counts.mild,
        counts.severe
    );
    Ok(())
}
