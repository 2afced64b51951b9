use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::scoring::{AlertConfig, LogisticTrendModel, RiskScorer, ScoringConfig, SequenceRiskModel};
use crate::session::{BaselineRefresh, EngineOptions, OrderingPolicy};

/// Engine configuration persisted as JSON. Every field has a default, so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub scoring: ScoringConfig,
    pub alerts: AlertConfig,
    pub ordering: OrderingPolicy,
    pub baseline_refresh: BaselineRefresh,
    pub model_timeout_ms: Option<u64>,
    /// JSON weights for `LogisticTrendModel`; built-in weights when unset.
    pub model_path: Option<PathBuf>,
}

impl EngineSettings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            alerts: self.alerts,
            ordering: self.ordering,
            baseline_refresh: self.baseline_refresh,
            model_timeout: self.model_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn load_model(&self) -> Result<Arc<dyn SequenceRiskModel>> {
        let model = match &self.model_path {
            Some(path) => LogisticTrendModel::load(path)?,
            None => LogisticTrendModel::default(),
        };
        info!("Using sequence model '{}'", model.name());
        Ok(Arc::new(model))
    }

    pub fn build_scorer(&self) -> Result<RiskScorer> {
        Ok(RiskScorer::new(self.scoring.clone(), self.load_model()?))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Opens the store at `path`. A missing file yields defaults; an
    /// unparsable one yields defaults with a warning.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings in {}: {err}; using defaults",
                    path.display()
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn get(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: EngineSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ThresholdMode;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(tmp.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), EngineSettings::default());
        assert_eq!(store.get().scoring.min_history, 10);
    }

    #[test]
    fn partial_file_overrides_named_fields_only() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(
            &path,
            r#"{"ordering": "reject", "scoring": {"threshold_mode": {"mode": "personalized", "k": 2.0, "min_samples": 5}}}"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.ordering, OrderingPolicy::Reject);
        assert_eq!(
            settings.scoring.threshold_mode,
            ThresholdMode::Personalized { k: 2.0, min_samples: 5 }
        );
        assert_eq!(settings.scoring.rule_weight, 0.7);
        assert_eq!(settings.alerts, AlertConfig::default());
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().get(), EngineSettings::default());
    }

    #[test]
    fn update_persists_and_reload_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.model_timeout_ms = Some(250);
        store.update(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.get(), settings);
        assert_eq!(
            reopened.get().engine_options().model_timeout,
            Some(Duration::from_millis(250))
        );

        store.update(EngineSettings::default()).unwrap();
        reopened.reload().unwrap();
        assert_eq!(reopened.get(), EngineSettings::default());
    }
}
