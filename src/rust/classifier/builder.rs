use std::sync::Arc;

use log::{info, warn};

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::pipeline::CategoryModel;
use crate::config::PredictorConfig;
use crate::model_manager::ModelStore;

/// A builder for constructing a Classifier with a fluent interface.
#[derive(Default)]
pub struct ClassifierBuilder {
    model: Option<Result<Arc<dyn CategoryModel>, String>>,
    config: PredictorConfig,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use txcat::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole predictor configuration
    pub fn with_config(mut self, config: PredictorConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an already fitted model
    pub fn with_model(mut self, model: Arc<dyn CategoryModel>) -> Self {
        self.model = Some(Ok(model));
        self
    }

    /// Uses the model owned by `store`, loading or training it if needed.
    ///
    /// A store that fails to produce a model does not fail the build: the
    /// resulting classifier reports `ModelNotReady` on every call instead.
    ///
    /// # Example
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use txcat::{Classifier, ModelStore};
    ///
    /// let store = ModelStore::new_default()?;
    /// let classifier = Classifier::builder().with_store(&store).build()?;
    /// let (category, confidence) = classifier.predict("coffee", "Starbucks")?;
    /// println!("{} ({:.2})", category, confidence);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_store(mut self, store: &ModelStore) -> Self {
        let model = match store.get_model() {
            Ok(pipeline) => {
                let model: Arc<dyn CategoryModel> = pipeline;
                Ok(model)
            }
            Err(e) => {
                warn!("Classifier built without a model: {}", e);
                Err(e.to_string())
            }
        };
        self.model = Some(model);
        self
    }

    /// Sets the minimum discounted confidence for accepting a prediction
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    /// Sets the label returned for rejected or empty inputs
    pub fn with_catch_all(mut self, label: impl Into<String>) -> Self {
        self.config.catch_all = label.into();
        self
    }

    /// Validates the configuration:
    /// - The threshold must be a number within [0, 1]
    /// - Both discounts must be within (0, 1]
    /// - The catch-all label must not be empty
    fn validate_config(config: &PredictorConfig) -> Result<(), ClassifierError> {
        if !(0.0..=1.0).contains(&config.confidence_threshold) {
            return Err(ClassifierError::Validation(format!(
                "Confidence threshold must be within [0, 1], got {}",
                config.confidence_threshold
            )));
        }
        for (name, discount) in [
            ("One-token", config.one_token_discount),
            ("Two-token", config.two_token_discount),
        ] {
            if !(discount > 0.0 && discount <= 1.0) {
                return Err(ClassifierError::Validation(format!(
                    "{} discount must be within (0, 1], got {}",
                    name, discount
                )));
            }
        }
        if config.catch_all.trim().is_empty() {
            return Err(ClassifierError::Validation("Catch-all category cannot be empty".into()));
        }
        Ok(())
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The constructed Classifier if successful, or an error if:
    ///   - No model or store was supplied
    ///   - The configuration is invalid
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        let model = self
            .model
            .ok_or_else(|| ClassifierError::Validation("A model or model store must be supplied".into()))?;
        Self::validate_config(&self.config)?;

        if let Ok(model) = &model {
            info!(
                "Classifier ready with {} categories (threshold {:.2})",
                model.classes().len(),
                self.config.confidence_threshold
            );
        }

        Ok(Classifier::from_parts(model, self.config))
    }
}
