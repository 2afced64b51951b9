pub mod bias;
pub mod engine;
pub mod history;
pub mod observer;
pub mod state;

pub use bias::{BiasCheck, NoBiasDetected};
pub use engine::{
    BaselineRefresh, EngineBuilder, EngineOptions, IngestOutcome, MonitorEngine, OrderingPolicy,
};
pub use history::{HistoryFuture, HistorySource, NoHistory, StaticHistory};
pub use observer::{RecordStore, RiskObserver, RiskRecord};
pub use state::{
    PatientSession, SessionEntry, SessionSnapshot, SessionStatus, SessionSummary, TierCounts,
};
