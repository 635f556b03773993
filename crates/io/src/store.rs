// Artifact store: fitted pipeline and trained classifier as JSON files

use std::path::{Path, PathBuf};

use heartline_pipeline::{ClassifierArtifact, ConsistencyGuard, FittedEncoder, PipelineArtifact};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::IoError;

pub const PIPELINE_FILE: &str = "pipeline.json";
pub const MODEL_FILE: &str = "model.json";

/// A directory holding one pipeline artifact and one classifier artifact.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pipeline_path(&self) -> PathBuf {
        self.dir.join(PIPELINE_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn save_pipeline(&self, artifact: &PipelineArtifact) -> Result<PathBuf, IoError> {
        let path = self.pipeline_path();
        write_json(&path, artifact)?;
        info!("wrote pipeline {} ({})", path.display(), artifact.fingerprint);
        Ok(path)
    }

    pub fn save_classifier(&self, artifact: &ClassifierArtifact) -> Result<PathBuf, IoError> {
        let path = self.model_path();
        write_json(&path, artifact)?;
        info!("wrote classifier {}", path.display());
        Ok(path)
    }

    pub fn load_pipeline(&self) -> Result<PipelineArtifact, IoError> {
        read_json(&self.pipeline_path())
    }

    /// Load the pipeline artifact and rebuild its guard (schema + encoder).
    pub fn load_encoder(&self) -> Result<ConsistencyGuard<FittedEncoder>, IoError> {
        let path = self.pipeline_path();
        self.load_pipeline()?
            .into_guard()
            .map_err(|e| IoError::artifact(&path, e))
    }

    pub fn load_classifier(&self) -> Result<ClassifierArtifact, IoError> {
        let path = self.model_path();
        let artifact: ClassifierArtifact = read_json(&path)?;
        artifact.check().map_err(|e| IoError::artifact(&path, e))?;
        Ok(artifact)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let write_err = |source| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| IoError::artifact(path, e))?;
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json).map_err(write_err)?;
    std::fs::rename(&temp_path, path).map_err(write_err)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let text = std::fs::read_to_string(path).map_err(|e| IoError::artifact(path, e))?;
    serde_json::from_str(&text).map_err(|e| IoError::artifact(path, e))
}
