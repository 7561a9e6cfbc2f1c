use crate::error::{IntakeError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GeorefConfig {
    /// Base URL of the geographic reference API, without a trailing slash.
    pub base_url: String,
    pub timeout_secs: u64,
    /// How long a fetched directory is reused before it is fetched again.
    pub cache_ttl_secs: u64,
    pub max_departments: u32,
    pub max_localities: u32,
}

impl Default for GeorefConfig {
    fn default() -> Self {
        Self {
            base_url: "https://apis.datos.gob.ar/georef/api".to_string(),
            timeout_secs: 10,
            cache_ttl_secs: 24 * 60 * 60,
            max_departments: 500,
            max_localities: 5000,
        }
    }
}

impl GeorefConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IntakeConfig {
    /// Directory holding one progress snapshot per applicant.
    pub store_dir: PathBuf,
    pub snapshot_prefix: String,
    pub export_prefix: String,
    pub georef: GeorefConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("."),
            snapshot_prefix: "progreso_".to_string(),
            export_prefix: "formulario_".to_string(),
            georef: GeorefConfig::default(),
        }
    }
}

impl IntakeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IntakeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot_prefix.trim().is_empty() {
            return Err(IntakeError::Config("snapshot_prefix cannot be empty".to_string()));
        }
        if self.export_prefix.trim().is_empty() {
            return Err(IntakeError::Config("export_prefix cannot be empty".to_string()));
        }
        if self
            .snapshot_prefix
            .chars()
            .chain(self.export_prefix.chars())
            .any(|c| matches!(c, '/' | '\\'))
        {
            return Err(IntakeError::Config(
                "file prefixes cannot contain path separators".to_string(),
            ));
        }
        if self.georef.base_url.trim().is_empty() {
            return Err(IntakeError::Config("georef.base_url cannot be empty".to_string()));
        }
        if self.georef.timeout_secs == 0 {
            return Err(IntakeError::Config("georef.timeout_secs must be > 0".to_string()));
        }
        if self.georef.cache_ttl_secs == 0 {
            return Err(IntakeError::Config("georef.cache_ttl_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Download name of the workbook for an applicant.
    pub fn export_file_name(&self, applicant_id: &str) -> String {
        format!("{}{}.xlsx", self.export_prefix, applicant_id)
    }
}
