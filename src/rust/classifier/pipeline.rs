use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::logistic::LogisticRegression;
use super::utils::SparseVector;
use super::vectorizer::TfIdfVectorizer;
use crate::config::{RegressionConfig, VectorizerConfig};

/// A model that maps feature text to a probability distribution over categories.
///
/// This is the seam between the predictor and whatever produced the
/// probabilities: a fitted [`Pipeline`] in production, a fixed table in tests.
pub trait CategoryModel: Send + Sync {
    /// Category labels, in the order `predict_proba` reports them
    fn classes(&self) -> &[String];

    /// Probability of every class for the given (already normalized) feature text
    fn predict_proba(&self, feature_text: &str) -> Vec<f64>;
}

/// A fitted vectorizer feeding a fitted classifier.
///
/// Immutable once fitted; share it behind an `Arc` for concurrent predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    vectorizer: TfIdfVectorizer,
    classifier: LogisticRegression,
}

// Compile-time verification of thread-safety
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn verify_thread_safety() {
        assert_send_sync::<Pipeline>();
    }
};

impl Pipeline {
    /// Fits a fresh vectorizer and classifier on `texts`/`labels`.
    ///
    /// # Arguments
    /// * `texts` - Feature texts, one per example
    /// * `labels` - Category of each example
    /// * `vectorizer` - Vectorization settings
    /// * `regression` - Classifier settings
    /// * `seed` - Seed of the classifier's sample ordering
    pub fn fit(
        texts: &[&str],
        labels: &[&str],
        vectorizer: &VectorizerConfig,
        regression: &RegressionConfig,
        seed: u64,
    ) -> Result<Self, ClassifierError> {
        Self::fit_until(texts, labels, vectorizer, regression, seed, &AtomicBool::new(false))
    }

    /// Like [`fit`](Self::fit), but returns `ClassifierError::Cancelled` once
    /// `cancel` is set.
    pub fn fit_until(
        texts: &[&str],
        labels: &[&str],
        vectorizer: &VectorizerConfig,
        regression: &RegressionConfig,
        seed: u64,
        cancel: &AtomicBool,
    ) -> Result<Self, ClassifierError> {
        let mut tfidf = TfIdfVectorizer::new(vectorizer.clone());
        tfidf.fit(texts)?;
        let samples: Vec<SparseVector> = texts.iter().map(|t| tfidf.transform(t)).collect();

        let mut classifier = LogisticRegression::new(regression.clone(), seed);
        classifier.fit_until(&samples, labels, tfidf.vocabulary_size(), cancel)?;

        Ok(Self {
            vectorizer: tfidf,
            classifier,
        })
    }

    /// Most probable class for `feature_text`
    pub fn predict(&self, feature_text: &str) -> &str {
        let proba = CategoryModel::predict_proba(self, feature_text);
        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, &p)| if p > proba[best] { i } else { best });
        &self.classifier.classes()[best]
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }

    pub fn seed(&self) -> u64 {
        self.classifier.seed()
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }
}

impl CategoryModel for Pipeline {
    fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    fn predict_proba(&self, feature_text: &str) -> Vec<f64> {
        let features = self.vectorizer.transform(feature_text);
        self.classifier.predict_proba(&features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_predict() -> Result<(), ClassifierError> {
        let texts = [
            "grocery walmart",
            "grocery kroger",
            "weekly grocery walmart",
            "fuel shell",
            "fuel chevron",
            "fuel station shell",
        ];
        let labels = ["Groceries", "Groceries", "Groceries", "Fuel", "Fuel", "Fuel"];
        let pipeline = Pipeline::fit(
            &texts,
            &labels,
            &VectorizerConfig::default(),
            &RegressionConfig::default(),
            42,
        )?;

        assert_eq!(pipeline.classes(), &["Fuel".to_string(), "Groceries".to_string()]);
        assert_eq!(pipeline.predict("grocery"), "Groceries");
        assert_eq!(pipeline.predict("fuel shell"), "Fuel");
        assert_eq!(pipeline.seed(), 42);
        Ok(())
    }
}
