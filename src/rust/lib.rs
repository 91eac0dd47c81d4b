//! A thread-safe transaction categorizer built on TF-IDF features and
//! elastic-net logistic regression.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use txcat::{Classifier, ModelStore};
//!
//! // Loads the persisted model, or trains one from the dataset next to it
//! let store = ModelStore::new_default()?;
//! let classifier = Classifier::builder().with_store(&store).build()?;
//!
//! let (category, confidence) = classifier.predict("grocery shopping", "Walmart")?;
//! println!("Predicted category: {} ({:.2})", category, confidence);
//! # Ok(())
//! # }
//! ```
//!
//! # Training
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use txcat::{Trainer, TrainerConfig};
//!
//! let trainer = Trainer::new(TrainerConfig::default());
//! let artifact = trainer.train_from_path("transactions.csv")?;
//! println!("Held-out accuracy: {:.3}", artifact.accuracy);
//! println!("{}", artifact.report);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A trained model is never mutated, so one [`Classifier`] can serve
//! predictions from many threads through an `Arc` without locking.

pub mod classifier;
pub mod config;
mod runtime;
pub mod model_manager;

pub use classifier::{
    build_feature_text, normalize, word_count, CategoryModel, ClassificationReport, Classifier, ClassifierBuilder,
    ClassifierError, ClassifierInfo, Dataset, ModelArtifact, Pipeline, Prediction, Trainer, TrainingExample,
};
pub use config::{PredictorConfig, RegressionConfig, Settings, TrainerConfig, VectorizerConfig};
pub use runtime::{create_thread_pool, RuntimeConfig};
pub use model_manager::{ModelMetrics, ModelStore};

pub fn init_logger() {
    env_logger::init();
}
