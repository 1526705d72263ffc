use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DATA_PATH_ENV: &str = "SOIL_DASHBOARD_DATA";
pub const GEOCODED_PATH_ENV: &str = "SOIL_DASHBOARD_GEOCODED";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Column mapping: source table header → measurement field
// ---------------------------------------------------------------------------

/// Source column names for each measurement field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub municipality: String,
    pub heavy_metal: String,
    pub land_use: String,
    pub year: String,
    pub concentration: String,
    pub sampling_period: String,
    pub sampling_date: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            municipality: "Municipality".to_string(),
            heavy_metal: "Heavy metal".to_string(),
            land_use: "Land use".to_string(),
            year: "Year".to_string(),
            concentration: "Heavy metal concentration (mg/kg DM)".to_string(),
            sampling_period: "Sampling Period".to_string(),
            sampling_date: "Sampling date".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chart sizing
// ---------------------------------------------------------------------------

/// How many entries each page chart shows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    /// Bars per metal in the overview's top-municipalities grid.
    pub top_municipalities: usize,
    /// Lines per metal in the overview time series.
    pub time_series_municipalities: usize,
    /// Rows in the heavy-metal detail ranking.
    pub ranking_size: usize,
    /// Ranked municipalities drawn in the heavy-metal time evolution.
    pub evolution_series: usize,
    /// Metals preselected when none are chosen.
    pub default_metal_count: usize,
    /// Entries in the map's highest / lowest lists.
    pub map_extremes: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            top_municipalities: 5,
            time_series_municipalities: 5,
            ranking_size: 15,
            evolution_series: 8,
            default_metal_count: 3,
            map_extremes: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// DashboardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub geocoded_path: PathBuf,
    pub columns: ColumnMapping,
    pub charts: ChartSettings,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data.csv"),
            geocoded_path: PathBuf::from("municipalities_geocoded.csv"),
            columns: ColumnMapping::default(),
            charts: ChartSettings::default(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` if given (defaults otherwise), then apply the
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override paths from `SOIL_DASHBOARD_DATA` / `SOIL_DASHBOARD_GEOCODED`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = lookup(DATA_PATH_ENV).filter(|p| !p.is_empty()) {
            self.data_path = PathBuf::from(p);
        }
        if let Some(p) = lookup(GEOCODED_PATH_ENV).filter(|p| !p.is_empty()) {
            self.geocoded_path = PathBuf::from(p);
        }
    }
}
