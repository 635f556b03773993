// Runtime settings
// Loaded from ./heartline.toml or ~/.config/heartline/heartline.toml

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "heartline.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Training hyperparameters and split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainSettings {
    /// Fraction of rows held out for evaluation.
    pub test_ratio: f64,
    pub seed: u64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub tolerance: f64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            learning_rate: 0.1,
            epochs: 1000,
            l2: 1e-3,
            tolerance: 1e-7,
        }
    }
}

/// HTTP behavior for `fetch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    /// Attempts per source, including the first.
    pub attempts: u32,
    /// Base backoff; doubles after each failed attempt.
    pub backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            attempts: 3,
            backoff_ms: 500,
        }
    }
}

/// One remote dataset source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    /// Built-in schema name or path to a schema TOML file.
    pub schema: String,
    /// Lower is tried first.
    #[serde(default)]
    pub priority: u32,
    /// Reject the source if fewer clean rows survive.
    #[serde(default)]
    pub min_rows: usize,
}

impl SourceSettings {
    fn new(name: &str, url: &str, schema: &str, priority: u32, min_rows: usize) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            schema: schema.into(),
            priority,
            min_rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding the canonical dataset and its backup.
    pub data_dir: PathBuf,
    /// Canonical dataset file name inside `data_dir`.
    pub dataset: String,
    /// Backup file name, written once before the first overwrite.
    pub backup: String,
    /// Directory for pipeline.json and model.json.
    pub artifact_dir: PathBuf,
    pub train: TrainSettings,
    pub fetch: FetchSettings,
    pub sources: Vec<SourceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            dataset: "heart.csv".into(),
            backup: "heart_old_backup.csv".into(),
            artifact_dir: PathBuf::from("artifacts"),
            train: TrainSettings::default(),
            fetch: FetchSettings::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<SourceSettings> {
    vec![
        SourceSettings::new(
            "heart-failure-xpy10",
            "https://raw.githubusercontent.com/xpy-10/DataSet/main/heart.csv",
            "heart_failure",
            1,
            500,
        ),
        // The two Heart-UCI mirrors serve the Kaggle re-encoding: zero-based
        // cp and slope, thal coded 1/2/3.
        SourceSettings::new(
            "heart-uci-sharmaroshan",
            "https://raw.githubusercontent.com/sharmaroshan/Heart-UCI/master/heart.csv",
            "heart_kaggle",
            2,
            250,
        ),
        SourceSettings::new(
            "heart-sid-darthvader",
            "https://raw.githubusercontent.com/Sid-darthvader/Heart-Disease-Prediction/master/heart.csv",
            "heart_kaggle",
            3,
            250,
        ),
        SourceSettings::new(
            "uci-cleveland",
            "https://archive.ics.uci.edu/ml/machine-learning-databases/heart-disease/processed.cleveland.data",
            "uci_cleveland",
            4,
            250,
        ),
    ]
}

impl Settings {
    /// Per-user settings file path.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("heartline")
            .join(SETTINGS_FILE)
    }

    /// Resolve and load settings.
    ///
    /// An explicit path must exist. Otherwise `./heartline.toml` wins over
    /// the per-user file; with neither present the defaults are used.
    /// Returns the file the settings came from, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from(path)?, Some(path.to_path_buf())));
        }
        for candidate in [PathBuf::from(SETTINGS_FILE), Self::config_path()] {
            if candidate.is_file() {
                let settings = Self::load_from(&candidate)?;
                return Ok((settings, Some(candidate)));
            }
        }
        debug!("no settings file found, using defaults");
        Ok((Self::default(), None))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, text).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.train;
        if !(t.test_ratio > 0.0 && t.test_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "train.test_ratio must be in (0, 1), got {}",
                t.test_ratio
            )));
        }
        if !(t.learning_rate > 0.0) || t.epochs == 0 {
            return Err(ConfigError::Invalid(
                "train.learning_rate and train.epochs must be positive".into(),
            ));
        }
        if t.l2 < 0.0 || t.tolerance < 0.0 {
            return Err(ConfigError::Invalid("train.l2 and train.tolerance must not be negative".into()));
        }
        if self.fetch.attempts == 0 {
            return Err(ConfigError::Invalid("fetch.attempts must be at least 1".into()));
        }
        if self.dataset.is_empty() || self.dataset == self.backup {
            return Err(ConfigError::Invalid(
                "dataset must be non-empty and differ from backup".into(),
            ));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.url.is_empty() {
                return Err(ConfigError::Invalid(format!("source '{}' has no url", source.name)));
            }
            if self.sources[..i].iter().any(|s| s.name == source.name) {
                return Err(ConfigError::Invalid(format!("duplicate source name '{}'", source.name)));
            }
        }
        Ok(())
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(&self.backup)
    }

    /// Sources in the order `fetch` tries them. Ties keep file order.
    pub fn sources_by_priority(&self) -> Vec<&SourceSettings> {
        let mut sources: Vec<&SourceSettings> = self.sources.iter().collect();
        sources.sort_by_key(|s| s.priority);
        sources
    }
}
