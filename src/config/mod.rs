// FleetCrab - GPL-3.0-or-later
// This file is part of FleetCrab.
//
// Copyright (C) 2025 The FleetCrab Authors
//
// FleetCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// FleetCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with FleetCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::analysis::health::HealthThresholds;
use crate::analysis::AnalysisContext;
use crate::correlation::{CorrelationParams, ScanStrategy};
use crate::parser::clock::{DisplayClock, UnknownTimezone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("window_minutes must be a finite number >= 0, got {0}")]
    InvalidWindow(f64),

    #[error("similarity_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error(transparent)]
    UnknownTimezone(#[from] UnknownTimezone),

    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Engine settings stored in the user's config directory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Correlation window in minutes; timeline correlation uses its floor.
    pub window_minutes: f64,
    pub similarity_threshold: f64,
    pub timezone: DisplayClock,
    pub similarity_scan: ScanStrategy,
    pub health: HealthThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_minutes: 5.0,
            similarity_threshold: 0.7,
            timezone: DisplayClock::Utc,
            similarity_scan: ScanStrategy::Pairwise,
            health: HealthThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// `<config dir>/fleetcrab/config.json`
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fleetcrab").join("config.json"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file is missing, unreadable or invalid.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            tracing::info!("No config found, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load and validate one specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default location, returning the path written.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_error)?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.window_minutes.is_finite() || self.window_minutes < 0.0 {
            return Err(ConfigError::InvalidWindow(self.window_minutes));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold(self.similarity_threshold));
        }
        Ok(())
    }

    /// Apply a display zone given by label or abbreviation.
    pub fn set_timezone(&mut self, name: &str) -> Result<(), ConfigError> {
        self.timezone = name.parse()?;
        Ok(())
    }

    #[must_use]
    pub const fn correlation_params(&self) -> CorrelationParams {
        CorrelationParams {
            window_minutes: self.window_minutes,
            similarity_threshold: self.similarity_threshold,
            scan: self.similarity_scan,
            clock: self.timezone,
        }
    }

    #[must_use]
    pub const fn analysis_context(&self) -> AnalysisContext {
        AnalysisContext {
            clock: self.timezone,
            thresholds: self.health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.window_minutes - 5.0).abs() < f64::EPSILON);
        assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.timezone, DisplayClock::Utc);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"timezone":"PST","similarity_scan":"windowed","health":{"memory_mb":256}}"#)
                .unwrap();
        assert_eq!(config.timezone, DisplayClock::PacificStandard);
        assert_eq!(config.similarity_scan, ScanStrategy::Windowed);
        assert!((config.health.memory_mb - 256.0).abs() < f64::EPSILON);
        assert!((config.health.load_1m - 2.0).abs() < f64::EPSILON);
        assert!((config.window_minutes - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let negative = EngineConfig {
            window_minutes: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::InvalidWindow(_))));

        let infinite = EngineConfig {
            window_minutes: f64::INFINITY,
            ..EngineConfig::default()
        };
        assert!(matches!(infinite.validate(), Err(ConfigError::InvalidWindow(_))));

        let threshold = EngineConfig {
            similarity_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(threshold.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = EngineConfig::default();
        config.set_timezone("Central (CDT)").unwrap();
        config.window_minutes = 2.5;

        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_rejects_invalid_values_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"similarity_threshold": 2}"#).unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::InvalidThreshold(_))
        ));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(EngineConfig::load_from(&path), Err(ConfigError::Json(_))));

        let err = EngineConfig::load_from(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_timezone() {
        let mut config = EngineConfig::default();
        assert!(matches!(
            config.set_timezone("Mars"),
            Err(ConfigError::UnknownTimezone(_))
        ));
        assert_eq!(config.timezone, DisplayClock::Utc);
    }
}
