mod error;
mod text;
mod utils;
mod stop_words;
pub mod vectorizer;
pub mod logistic;
mod pipeline;
pub mod dataset;
pub mod split;
pub mod metrics;
mod trainer;
mod classifier;
pub mod builder;

pub use error::ClassifierError;
pub use text::{build_feature_text, normalize, word_count};
pub use utils::SparseVector;
pub use pipeline::{CategoryModel, Pipeline};
pub use dataset::{Dataset, PreparedData, TrainingExample};
pub use metrics::ClassificationReport;
pub use trainer::{CandidateScore, ModelArtifact, Trainer};
pub use classifier::{Classifier, Prediction};
pub use builder::ClassifierBuilder;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInfo {
    /// Whether a trained model is attached
    pub ready: bool,
    /// Number of categories the model can emit
    pub num_classes: usize,
    /// Categories of the model, sorted
    pub class_labels: Vec<String>,
    /// Label returned for low-confidence predictions
    pub catch_all: String,
    pub confidence_threshold: f64,
}
