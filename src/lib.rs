pub mod baseline;
pub mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod utils;

use clap::Parser;

pub use baseline::{PatientBaseline, VitalStats};
pub use db::Database;
pub use error::IngestError;
pub use models::{Alert, AlertTier, ModelStatus, Reading, RiskAssessment, Vital, Vitals};
pub use scoring::{classify, LogisticTrendModel, RiskScorer, ScoringConfig, SequenceRiskModel};
pub use session::{
    BiasCheck, HistorySource, IngestOutcome, MonitorEngine, PatientSession, RiskObserver,
    RiskRecord, SessionSnapshot,
};
pub use settings::{EngineSettings, SettingsStore};

/// Initializes `env_logger` at info level; `RUST_LOG` overrides.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    init_logging();

    let cli = cli::Cli::parse();
    log::info!("vitalwatch starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::dispatch(cli))
}
