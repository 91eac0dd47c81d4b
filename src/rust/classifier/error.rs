use std::io;

/// Represents the different types of errors that can occur while training or using the classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The dataset is missing one or more required columns
    #[error("Schema error: dataset is missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    /// Fewer than two categories survived filtering
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// A prediction was attempted without a usable model
    #[error("Model not ready: {0}")]
    ModelNotReady(String),
    /// The persisted artifact is missing, corrupt or incompatible
    #[error("Artifact load error: {0}")]
    ArtifactLoad(String),
    /// The artifact could not be written
    #[error("Artifact save error: {0}")]
    ArtifactSave(String),
    /// The dataset could not be read or parsed
    #[error("Dataset error: {0}")]
    Dataset(String),
    /// Fitting a pipeline failed
    #[error("Training error: {0}")]
    Training(String),
    /// Training was stopped through the trainer's cancel flag
    #[error("Training cancelled")]
    Cancelled,
    /// Invalid input parameters
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClassifierError {
    /// Whether a request-handling caller should report this as "service unavailable"
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ModelNotReady(_))
    }
}

impl From<csv::Error> for ClassifierError {
    fn from(err: csv::Error) -> Self {
        ClassifierError::Dataset(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_columns() {
        let err = ClassifierError::Schema {
            missing: vec!["merchant".into(), "category".into()],
        };
        assert_eq!(
            err.to_string(),
            "Schema error: dataset is missing required column(s): merchant, category"
        );
    }

    #[test]
    fn test_service_unavailable() {
        assert!(ClassifierError::ModelNotReady("no model".into()).is_service_unavailable());
        assert!(!ClassifierError::Validation("bad".into()).is_service_unavailable());
    }
}
