use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log;
use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierError, ModelArtifact, Pipeline, Trainer};

/// First token of the artifact header line
const ARTIFACT_MAGIC: &str = "TXCAT-MODEL";
/// Bumped whenever the serialized pipeline layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

pub const ARTIFACT_FILE_NAME: &str = "model.json";
pub const DATASET_FILE_NAME: &str = "transactions.csv";

/// Scores recorded with the adopted model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub cv_score: f64,
}

#[derive(Debug)]
struct LoadedModel {
    pipeline: Arc<Pipeline>,
    metrics: ModelMetrics,
}

/// Owns the process's single trained pipeline.
///
/// The first call to [`ModelStore::get_model`] loads the persisted artifact,
/// or trains a new one from the dataset when the artifact is missing or
/// unreadable. The outcome, including a failure, is kept for the lifetime of
/// the store: construct one store per process and hand it to whoever needs
/// predictions.
#[derive(Debug)]
pub struct ModelStore {
    artifact_path: PathBuf,
    dataset_path: PathBuf,
    trainer: Trainer,
    model: OnceLock<Result<LoadedModel, String>>,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(artifact_path: P, dataset_path: Q, trainer: Trainer) -> Self {
        Self {
            artifact_path: artifact_path.as_ref().to_path_buf(),
            dataset_path: dataset_path.as_ref().to_path_buf(),
            trainer,
            model: OnceLock::new(),
        }
    }

    /// Creates a store rooted in the default directory with a default trainer
    pub fn new_default() -> io::Result<Self> {
        Self::in_dir(Self::get_default_model_dir(), Trainer::default())
    }

    /// Creates a store whose artifact and dataset live in `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P, trainer: Trainer) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self::new(dir.join(ARTIFACT_FILE_NAME), dir.join(DATASET_FILE_NAME), trainer))
    }

    /// Returns the default directory for the artifact and dataset
    pub fn get_default_model_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("TXCAT_HOME") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("txcat");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("txcat");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("txcat")
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Returns the shared pipeline, loading or training it on first use.
    ///
    /// # Errors
    /// * `ClassifierError::ModelNotReady` if neither loading nor training
    ///   produced a pipeline
    pub fn get_model(&self) -> Result<Arc<Pipeline>, ClassifierError> {
        match self.model.get_or_init(|| self.load_or_train()) {
            Ok(loaded) => Ok(Arc::clone(&loaded.pipeline)),
            Err(reason) => Err(ClassifierError::ModelNotReady(reason.clone())),
        }
    }

    /// Scores of the adopted model, if one has been adopted
    pub fn metrics(&self) -> Option<ModelMetrics> {
        match self.model.get() {
            Some(Ok(loaded)) => Some(loaded.metrics),
            _ => None,
        }
    }

    /// Whether `get_model` has already run
    pub fn is_initialized(&self) -> bool {
        self.model.get().is_some()
    }

    fn load_or_train(&self) -> Result<LoadedModel, String> {
        if self.artifact_path.exists() {
            match Self::load_artifact(&self.artifact_path) {
                Ok(artifact) => {
                    log::info!(
                        "Model loaded from {:?}. Accuracy: {:.3}, CV: {:.3}",
                        self.artifact_path,
                        artifact.accuracy,
                        artifact.cv_score
                    );
                    return Ok(LoadedModel::from(artifact));
                }
                Err(e) => log::warn!("Failed to load model: {}", e),
            }
        } else {
            log::info!("No model artifact at {:?}", self.artifact_path);
        }

        log::info!("Training model with multiple iterations...");
        match Self::train_and_save(&self.trainer, &self.dataset_path, &self.artifact_path) {
            Ok(artifact) => Ok(LoadedModel::from(artifact)),
            Err(e) => {
                log::error!("Training failed: {}", e);
                Err(e.to_string())
            }
        }
    }

    /// Trains on the dataset at `dataset_path` and persists the result to
    /// `artifact_path`.
    ///
    /// A failure to persist is logged and otherwise ignored: the returned
    /// artifact is still usable for the lifetime of the process. A cancelled
    /// run never writes the artifact.
    pub fn train_and_save(
        trainer: &Trainer,
        dataset_path: &Path,
        artifact_path: &Path,
    ) -> Result<ModelArtifact, ClassifierError> {
        let artifact = trainer.train_from_path(dataset_path)?;
        if trainer.is_cancelled() {
            return Err(ClassifierError::Cancelled);
        }
        match Self::save_artifact(artifact_path, &artifact) {
            Ok(()) => log::info!("Best model saved to {:?}", artifact_path),
            Err(e) => log::error!("Failed to save model to {:?}: {}", artifact_path, e),
        }
        Ok(artifact)
    }

    /// Writes `artifact` to `path`, replacing any previous artifact.
    ///
    /// The file starts with a header line `TXCAT-MODEL <version> <sha256>`
    /// followed by the JSON body the checksum covers. The body is written to a
    /// temporary sibling first and renamed into place.
    pub fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<(), ClassifierError> {
        let body = serde_json::to_vec(artifact)
            .map_err(|e| ClassifierError::ArtifactSave(format!("Failed to serialize model: {}", e)))?;
        let header = format!("{} {} {}\n", ARTIFACT_MAGIC, ARTIFACT_FORMAT_VERSION, sha256_hex(&body));

        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&body);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ClassifierError::ArtifactSave(format!("{:?}: {}", parent, e)))?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        log::debug!("Writing {} bytes to {:?}", bytes.len(), tmp_path);
        fs::write(&tmp_path, &bytes)
            .and_then(|_| fs::rename(&tmp_path, path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                ClassifierError::ArtifactSave(format!("{:?}: {}", path, e))
            })
    }

    /// Reads and verifies the artifact at `path`.
    ///
    /// # Errors
    /// * `ClassifierError::ArtifactLoad` if the file is missing or unreadable,
    ///   the header is malformed, the format version differs, the checksum
    ///   does not match or the body cannot be deserialized
    pub fn load_artifact(path: &Path) -> Result<ModelArtifact, ClassifierError> {
        let bytes = fs::read(path).map_err(|e| ClassifierError::ArtifactLoad(format!("{:?}: {}", path, e)))?;
        log::debug!("Read {} bytes from {:?}", bytes.len(), path);
        let body = Self::verified_body(&bytes)?;
        serde_json::from_slice(body)
            .map_err(|e| ClassifierError::ArtifactLoad(format!("Failed to deserialize model: {}", e)))
    }

    /// Whether the artifact at `path` has a valid header and checksum
    pub fn verify_artifact(path: &Path) -> bool {
        match fs::read(path) {
            Ok(bytes) => Self::verified_body(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// Deletes the persisted artifact, if any
    pub fn remove_artifact(&self) -> Result<(), ClassifierError> {
        if self.artifact_path.exists() {
            fs::remove_file(&self.artifact_path)?;
        }
        Ok(())
    }

    fn verified_body(bytes: &[u8]) -> Result<&[u8], ClassifierError> {
        let newline = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| ClassifierError::ArtifactLoad("Missing artifact header".into()))?;
        let header = std::str::from_utf8(&bytes[..newline])
            .map_err(|_| ClassifierError::ArtifactLoad("Artifact header is not valid UTF-8".into()))?;
        let body = &bytes[newline + 1..];

        let parts: Vec<&str> = header.split_whitespace().collect();
        let (version, expected_hash) = match parts.as_slice() {
            [magic, version, hash] if *magic == ARTIFACT_MAGIC => (*version, *hash),
            _ => return Err(ClassifierError::ArtifactLoad(format!("Unrecognized artifact header {:?}", header))),
        };

        if version.parse::<u32>().ok() != Some(ARTIFACT_FORMAT_VERSION) {
            return Err(ClassifierError::ArtifactLoad(format!(
                "Unsupported artifact version {} (expected {})",
                version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let actual_hash = sha256_hex(body);
        if actual_hash != expected_hash {
            return Err(ClassifierError::ArtifactLoad(format!(
                "Hash mismatch: expected {}, got {}",
                expected_hash, actual_hash
            )));
        }
        Ok(body)
    }
}

impl From<ModelArtifact> for LoadedModel {
    fn from(artifact: ModelArtifact) -> Self {
        Self {
            metrics: ModelMetrics {
                accuracy: artifact.accuracy,
                cv_score: artifact.cv_score,
            },
            pipeline: Arc::new(artifact.pipeline),
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
