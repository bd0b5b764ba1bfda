//! Simulation control constants and how they are loaded.

use crate::compute::ledger::ComputationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ComputationError {
    fn from(err: ConfigError) -> Self {
        ComputationError::InvalidConfig(err.to_string())
    }
}

/// Clock constants supplied by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_time: f64,
    pub final_time: f64,
    pub time_step: f64,
    /// Interval between recorded results. Defaults to `time_step`.
    #[serde(default)]
    pub saveper: Option<f64>,
    #[serde(default)]
    pub time_units: Option<String>,
}

impl SimulationConfig {
    pub fn new(initial_time: f64, final_time: f64, time_step: f64) -> Self {
        Self { initial_time, final_time, time_step, saveper: None, time_units: None }
    }

    pub fn with_saveper(mut self, saveper: f64) -> Self {
        self.saveper = Some(saveper);
        self
    }

    pub fn with_time_units(mut self, units: impl Into<String>) -> Self {
        self.time_units = Some(units.into());
        self
    }

    pub fn saveper(&self) -> f64 {
        self.saveper.unwrap_or(self.time_step)
    }

    /// Number of steps between recorded rows.
    pub fn save_stride(&self) -> u64 {
        (self.saveper() / self.time_step).round().max(1.0) as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("initial_time", self.initial_time),
            ("final_time", self.final_time),
            ("time_step", self.time_step),
            ("saveper", self.saveper()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::Invalid(format!("{} must be finite", name)));
        }
        if self.time_step <= 0.0 {
            return Err(ConfigError::Invalid(format!("time_step must be positive, got {}", self.time_step)));
        }
        if self.final_time < self.initial_time {
            return Err(ConfigError::Invalid(format!(
                "final_time {} is before initial_time {}",
                self.final_time, self.initial_time
            )));
        }
        if self.saveper() < self.time_step {
            return Err(ConfigError::Invalid(format!(
                "saveper {} is smaller than time_step {}",
                self.saveper(),
                self.time_step
            )));
        }
        let ratio = self.saveper() / self.time_step;
        if (ratio - ratio.round()).abs() > 1e-9 {
            warn!(saveper = self.saveper(), time_step = self.time_step, "saveper is not a multiple of time_step; rounding");
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"initial_time": 1, "final_time": 13, "time_step": 0.25, "time_units": "Months"}}"#
        )
        .unwrap();

        let config = SimulationConfig::from_path(file.path()).unwrap();
        assert_eq!(config.initial_time, 1.0);
        assert_eq!(config.saveper(), 0.25);
        assert_eq!(config.time_units.as_deref(), Some("Months"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimulationConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = SimulationConfig::from_json_str("{\"initial_time\": 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[rstest]
    #[case(SimulationConfig::new(0.0, 10.0, 0.0))]
    #[case(SimulationConfig::new(0.0, 10.0, -1.0))]
    #[case(SimulationConfig::new(5.0, 1.0, 1.0))]
    #[case(SimulationConfig::new(0.0, f64::INFINITY, 1.0))]
    #[case(SimulationConfig::new(0.0, 10.0, 1.0).with_saveper(0.5))]
    fn test_invalid_configs(#[case] config: SimulationConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[rstest]
    #[case(0.25, None, 1)]
    #[case(0.25, Some(1.0), 4)]
    #[case(1.0, Some(2.5), 3)]
    fn test_save_stride(#[case] dt: f64, #[case] saveper: Option<f64>, #[case] expected: u64) {
        let config = SimulationConfig { saveper, ..SimulationConfig::new(0.0, 10.0, dt) };
        assert_eq!(config.save_stride(), expected);
    }
}
