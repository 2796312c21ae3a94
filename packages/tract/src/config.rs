#![allow(clippy::module_name_repetitions)]
//! Pipeline configuration.
//!
//! Input files, the county to correct against, and the bulk cache location
//! are read from a TOML file and passed explicitly into the builder and
//! the bulk pipeline. Relative paths resolve against `data_dir`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::TractError;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base directory for relative paths (default: `data`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Raw Census tract export.
    pub tracts: TractSourceConfig,
    /// County boundary dataset.
    pub county_boundaries: CountyBoundaryConfig,
    /// Emergency call dataset.
    pub incidents: IncidentSourceConfig,
    /// Durable cache for the bulk assignment pass. No caching when absent.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

/// Where the raw tracts come from and which county to clip them to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TractSourceConfig {
    /// Census tract CSV (e.g. `Census_2010_Tracts.csv`).
    pub path: PathBuf,
    /// County name as it appears in the boundary dataset.
    pub county: String,
}

/// The county boundary `GeoJSON` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountyBoundaryConfig {
    /// `GeoJSON` `FeatureCollection` of county outlines.
    pub path: PathBuf,
    /// Feature property holding the county name (default: `COUNTY`).
    #[serde(default = "default_name_field")]
    pub name_field: String,
}

/// The incident CSV and the columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSourceConfig {
    /// Call dataset CSV.
    pub path: PathBuf,
    /// Column holding `"(lat, lon)"` text (default: `Location`).
    #[serde(default = "default_location_column")]
    pub location_column: String,
    /// Optional row filter applied while loading.
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
}

/// Keep only rows whose `column` equals `value` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    /// Column name (e.g. `Call Type`).
    pub column: String,
    /// Required value (e.g. `Medical Incident`).
    pub value: String,
}

/// Where the augmented dataset is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache file name (e.g. `Med_Calls_with_Tracts.csv`).
    pub path: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_name_field() -> String {
    "COUNTY".to_string()
}

fn default_location_column() -> String {
    "Location".to_string()
}

impl PipelineConfig {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`TractError::Config`] if it is not valid configuration.
    pub fn load(path: &Path) -> Result<Self, TractError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parses a TOML configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`TractError::Config`] if the text is not valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, TractError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Resolves a configured path against `data_dir`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Path of the raw tract CSV.
    #[must_use]
    pub fn tracts_path(&self) -> PathBuf {
        self.resolve(&self.tracts.path)
    }

    /// Path of the county boundary dataset.
    #[must_use]
    pub fn county_boundaries_path(&self) -> PathBuf {
        self.resolve(&self.county_boundaries.path)
    }

    /// Path of the incident CSV.
    #[must_use]
    pub fn incidents_path(&self) -> PathBuf {
        self.resolve(&self.incidents.path)
    }

    /// Path of the bulk assignment cache, if caching is configured.
    #[must_use]
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache.as_ref().map(|cache| self.resolve(&cache.path))
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
