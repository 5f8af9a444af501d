//! Pipeline configuration.
//!
//! Loaded from `~/.studiolink/config.json` when present; every field has a
//! default so a missing or partial file still yields a working pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::DbError;
use crate::matcher::ScoreWeights;

const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
const DEFAULT_TIE_EPSILON: f64 = 0.05;
const DEFAULT_BATCH_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Candidates below this confidence never become suggestions.
    pub min_confidence: f64,
    /// Candidates within this distance of the top score are all surfaced.
    pub tie_epsilon: f64,
    /// Maximum unprocessed emails consumed per batch run.
    pub batch_limit: usize,
    pub weights: ScoreWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            tie_epsilon: DEFAULT_TIE_EPSILON,
            batch_limit: DEFAULT_BATCH_LIMIT,
            weights: ScoreWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path().map_err(|e| e.to_string())?;
        Self::load_from(&path)
    }

    /// Load from an explicit path. A missing file yields defaults; a file
    /// that exists but fails to parse is an error, so a typo in the config
    /// never silently reverts the thresholds.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
    }

    fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".studiolink").join("config.json"))
    }
}
