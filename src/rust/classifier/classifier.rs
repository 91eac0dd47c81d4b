use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::error::ClassifierError;
use super::pipeline::CategoryModel;
use super::text::{build_feature_text, word_count};
use crate::config::PredictorConfig;

/// The outcome of one prediction, with both the thresholded decision and the
/// model's raw top guess.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The accepted category, or the catch-all label
    pub category: String,
    /// Confidence after the short-text discount
    pub confidence: f64,
    /// The model's most probable category, before thresholding
    pub raw_category: String,
    /// Probability of `raw_category`, before the discount
    pub raw_confidence: f64,
    /// Whether `confidence` met the threshold
    pub accepted: bool,
}

/// A thread-safe transaction categorizer.
///
/// # Thread Safety
///
/// The model is immutable after training and shared through an `Arc`, so a
/// `Classifier` can be shared across threads without locking.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use std::thread;
/// use txcat::{Classifier, Pipeline, RegressionConfig, VectorizerConfig};
///
/// let texts = [
///     "grocery grocery walmart", "grocery store grocery store kroger",
///     "fuel fuel shell", "gas fuel gas fuel chevron",
/// ];
/// let labels = ["Groceries", "Groceries", "Fuel", "Fuel"];
/// let vectorizer = VectorizerConfig { min_df: 1, ..VectorizerConfig::default() };
/// let pipeline = Pipeline::fit(&texts, &labels, &vectorizer, &RegressionConfig::default(), 42)?;
///
/// let classifier = Arc::new(Classifier::builder().with_model(Arc::new(pipeline)).build()?);
///
/// let mut handles = vec![];
/// for _ in 0..3 {
///     let classifier = Arc::clone(&classifier);
///     handles.push(thread::spawn(move || {
///         classifier.predict("fuel", "Shell").unwrap();
///     }));
/// }
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Classifier {
    model: Result<Arc<dyn CategoryModel>, String>,
    config: PredictorConfig,
}

// Compile-time verification of thread-safety
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("classes", &self.model.as_ref().map(|m| m.classes().to_vec()))
            .field("config", &self.config)
            .finish()
    }
}

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    pub(crate) fn from_parts(model: Result<Arc<dyn CategoryModel>, String>, config: PredictorConfig) -> Self {
        Self { model, config }
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        let class_labels = match &self.model {
            Ok(model) => model.classes().to_vec(),
            Err(_) => Vec::new(),
        };
        super::ClassifierInfo {
            ready: self.model.is_ok(),
            num_classes: class_labels.len(),
            class_labels,
            catch_all: self.config.catch_all.clone(),
            confidence_threshold: self.config.confidence_threshold,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predicts the category of a transaction.
    ///
    /// # Returns
    /// * The category, or the catch-all label when the discounted confidence
    ///   falls below the threshold or the transaction has no usable text
    /// * The discounted confidence (0.0 for empty text)
    ///
    /// # Errors
    /// * `ClassifierError::ModelNotReady` if no model is available
    pub fn predict(&self, description: &str, merchant: &str) -> Result<(String, f64), ClassifierError> {
        let prediction = self.predict_detailed(description, merchant)?;
        Ok((prediction.category, prediction.confidence))
    }

    /// Like [`Classifier::predict`] but returns only the category
    pub fn predict_category(&self, description: &str, merchant: &str) -> Result<String, ClassifierError> {
        self.predict_detailed(description, merchant).map(|p| p.category)
    }

    /// Predicts the category and reports the raw top guess alongside the
    /// thresholded decision.
    pub fn predict_detailed(&self, description: &str, merchant: &str) -> Result<Prediction, ClassifierError> {
        let model = self.model()?;
        let feature_text = build_feature_text(description, merchant);
        if feature_text.is_empty() {
            return Ok(Prediction {
                category: self.config.catch_all.clone(),
                confidence: 0.0,
                raw_category: self.config.catch_all.clone(),
                raw_confidence: 0.0,
                accepted: false,
            });
        }

        let probabilities = model.predict_proba(&feature_text);
        let (best, raw_confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
                Some((_, top)) if top >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| ClassifierError::ModelNotReady("Model reported no categories".into()))?;
        let raw_category = model
            .classes()
            .get(best)
            .cloned()
            .ok_or_else(|| ClassifierError::ModelNotReady("Model class list is inconsistent".into()))?;

        let confidence = raw_confidence * self.discount(word_count(&feature_text));
        let accepted = confidence >= self.config.confidence_threshold;
        let category = if accepted {
            raw_category.clone()
        } else {
            self.config.catch_all.clone()
        };

        Ok(Prediction {
            category,
            confidence,
            raw_category,
            raw_confidence,
            accepted,
        })
    }

    /// Returns the `k` most probable categories in descending probability
    /// order, without discount or threshold.
    ///
    /// An empty feature text yields the single entry `(catch_all, 0.0)`.
    /// Fewer than `k` entries are returned when the model knows fewer
    /// categories.
    pub fn top_k(&self, description: &str, merchant: &str, k: usize) -> Result<Vec<(String, f64)>, ClassifierError> {
        let model = self.model()?;
        let feature_text = build_feature_text(description, merchant);
        if feature_text.is_empty() {
            return Ok(vec![(self.config.catch_all.clone(), 0.0)]);
        }

        let probabilities = model.predict_proba(&feature_text);
        let mut ranked: Vec<(String, f64)> = model
            .classes()
            .iter()
            .cloned()
            .zip(probabilities)
            .collect();
        // Stable sort keeps class order among equal probabilities
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }

    fn model(&self) -> Result<&Arc<dyn CategoryModel>, ClassifierError> {
        self.model
            .as_ref()
            .map_err(|reason| ClassifierError::ModelNotReady(reason.clone()))
    }

    fn discount(&self, tokens: usize) -> f64 {
        match tokens {
            0 | 1 => self.config.one_token_discount,
            2 => self.config.two_token_discount,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::thread;

    /// Returns the same distribution for every input and counts calls
    struct FixedModel {
        classes: Vec<String>,
        probabilities: Vec<f64>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                classes: pairs.iter().map(|(c, _)| c.to_string()).collect(),
                probabilities: pairs.iter().map(|(_, p)| *p).collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    impl CategoryModel for FixedModel {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict_proba(&self, _feature_text: &str) -> Vec<f64> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.probabilities.clone()
        }
    }

    fn classifier(model: Arc<FixedModel>) -> Classifier {
        let model: Arc<dyn CategoryModel> = model;
        Classifier::from_parts(Ok(model), PredictorConfig::default())
    }

    #[test]
    fn test_empty_input_skips_model() {
        let model = FixedModel::new(&[("Food", 0.9), ("Travel", 0.1)]);
        let classifier = classifier(Arc::clone(&model));

        assert_eq!(classifier.predict("", "").unwrap(), ("Other".to_string(), 0.0));
        assert_eq!(classifier.predict("!!!", "  ").unwrap(), ("Other".to_string(), 0.0));
        assert_eq!(classifier.top_k("", "", 3).unwrap(), vec![("Other".to_string(), 0.0)]);
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_low_confidence_returns_catch_all() {
        let model = FixedModel::new(&[("Food", 0.35), ("Travel", 0.33), ("Bills", 0.32)]);
        let classifier = classifier(model);

        // "lunch lunch cafe" has three tokens, so no discount applies
        let (category, confidence) = classifier.predict("lunch", "cafe").unwrap();
        assert_eq!(category, "Other");
        assert!((confidence - 0.35).abs() < 1e-12);

        let detailed = classifier.predict_detailed("lunch", "cafe").unwrap();
        assert_eq!(detailed.raw_category, "Food");
        assert!(!detailed.accepted);
    }

    #[test]
    fn test_short_text_discount() {
        let model = FixedModel::new(&[("Food", 0.5), ("Travel", 0.5)]);
        let classifier = classifier(model);

        // One token: 0.5 * 0.70 falls below the threshold
        let one = classifier.predict_detailed("", "cafe").unwrap();
        assert!((one.confidence - 0.35).abs() < 1e-12);
        assert_eq!(one.category, "Other");

        // Two tokens: 0.5 * 0.85 is accepted; ties go to the first class
        let two = classifier.predict_detailed("", "corner cafe").unwrap();
        assert!((two.confidence - 0.425).abs() < 1e-12);
        assert_eq!(two.category, "Food");

        let three = classifier.predict_detailed("lunch", "cafe").unwrap();
        assert!((three.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_top_k_ordering() {
        let model = FixedModel::new(&[("Bills", 0.1), ("Food", 0.6), ("Kids", 0.05), ("Travel", 0.25)]);
        let classifier = classifier(model);

        let top = classifier.top_k("lunch", "cafe", 3).unwrap();
        let labels: Vec<&str> = top.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(labels, vec!["Food", "Travel", "Bills"]);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));

        assert_eq!(classifier.top_k("lunch", "cafe", 10).unwrap().len(), 4);
        assert!(classifier.top_k("lunch", "cafe", 0).unwrap().is_empty());
    }

    #[test]
    fn test_model_not_ready() {
        let classifier = Classifier::from_parts(Err("training failed".into()), PredictorConfig::default());
        let err = classifier.predict("coffee", "Starbucks").unwrap_err();
        assert!(err.is_service_unavailable());
        assert!(classifier.top_k("coffee", "Starbucks", 3).is_err());
        assert!(!classifier.info().ready);
    }

    #[test]
    fn test_concurrent_predictions() {
        let model = FixedModel::new(&[("Food", 0.8), ("Travel", 0.2)]);
        let classifier = Arc::new(classifier(Arc::clone(&model)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let classifier = Arc::clone(&classifier);
                thread::spawn(move || classifier.predict("grocery run", "Walmart").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().0, "Food");
        }
        assert_eq!(model.calls(), 4);
    }
}
