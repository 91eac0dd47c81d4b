use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Confidence below which a prediction is replaced by the catch-all category
pub const CONFIDENCE_THRESHOLD: f64 = 0.40;
/// Categories with fewer examples than this are dropped before training
pub const MIN_SAMPLES_PER_CLASS: usize = 3;
/// Number of candidate pipelines trained per run
pub const N_TRAINING_ITERATIONS: usize = 5;
/// Label returned when no category clears the confidence threshold
pub const CATCH_ALL_CATEGORY: &str = "Other";

/// Settings of the TF-IDF vectorization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Smallest and largest n-gram length
    pub ngram_range: (usize, usize),
    /// Terms present in fewer documents than this are ignored
    pub min_df: usize,
    /// Terms present in a larger fraction of documents than this are ignored
    pub max_df: f64,
    /// Upper bound on the vocabulary size
    pub max_features: usize,
    /// Replace raw term counts with `1 + ln(count)`
    pub sublinear_tf: bool,
    /// Drop English stop-words before building n-grams
    pub stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 3),
            min_df: 2,
            max_df: 0.95,
            max_features: 10_000,
            sublinear_tf: true,
            stop_words: true,
        }
    }
}

/// Settings of the elastic-net logistic regression stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Inverse regularization strength
    pub c: f64,
    /// Share of the L1 penalty in the elastic-net mix
    pub l1_ratio: f64,
    pub learning_rate: f64,
    /// Per-epoch learning rate decay: `lr / (1 + decay * epoch)`
    pub decay: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    /// Largest per-epoch weight change considered converged
    pub tolerance: f64,
    /// Weight classes inversely to their frequency
    pub balanced: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            l1_ratio: 0.5,
            learning_rate: 0.5,
            decay: 0.01,
            batch_size: 32,
            max_epochs: 100,
            tolerance: 1e-4,
            balanced: true,
        }
    }
}

/// Settings of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub min_samples_per_class: usize,
    /// Number of candidate pipelines; candidate `i` is seeded with `base_seed + i`
    pub iterations: usize,
    pub base_seed: u64,
    /// Fraction of every class held out for evaluation
    pub test_ratio: f64,
    pub split_seed: u64,
    pub cv_folds: usize,
    pub vectorizer: VectorizerConfig,
    pub regression: RegressionConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_samples_per_class: MIN_SAMPLES_PER_CLASS,
            iterations: N_TRAINING_ITERATIONS,
            base_seed: 42,
            test_ratio: 0.2,
            split_seed: 42,
            cv_folds: 5,
            vectorizer: VectorizerConfig::default(),
            regression: RegressionConfig::default(),
        }
    }
}

/// Settings of the predictor's accept/reject decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub confidence_threshold: f64,
    pub catch_all: String,
    /// Confidence multiplier for single-token feature texts
    pub one_token_discount: f64,
    /// Confidence multiplier for two-token feature texts
    pub two_token_discount: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            catch_all: CATCH_ALL_CATEGORY.to_string(),
            one_token_discount: 0.70,
            two_token_discount: 0.85,
        }
    }
}

/// The tunable knobs, with environment overrides applied.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub trainer: TrainerConfig,
    pub predictor: PredictorConfig,
}

impl Settings {
    /// Reads `TXCAT_CONFIDENCE_THRESHOLD`, `TXCAT_MIN_SAMPLES_PER_CLASS` and
    /// `TXCAT_TRAINING_ITERATIONS` on top of the defaults.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(threshold) = env_override::<f64>("TXCAT_CONFIDENCE_THRESHOLD") {
            if (0.0..=1.0).contains(&threshold) {
                settings.predictor.confidence_threshold = threshold;
            } else {
                log::warn!("Ignoring TXCAT_CONFIDENCE_THRESHOLD={} (must be within [0, 1])", threshold);
            }
        }
        if let Some(min_samples) = env_override::<usize>("TXCAT_MIN_SAMPLES_PER_CLASS") {
            settings.trainer.min_samples_per_class = min_samples;
        }
        if let Some(iterations) = env_override::<usize>("TXCAT_TRAINING_ITERATIONS") {
            if iterations > 0 {
                settings.trainer.iterations = iterations;
            } else {
                log::warn!("Ignoring TXCAT_TRAINING_ITERATIONS=0");
            }
        }
        settings
    }
}

fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.predictor.confidence_threshold, 0.40);
        assert_eq!(settings.predictor.catch_all, "Other");
        assert_eq!(settings.trainer.min_samples_per_class, 3);
        assert_eq!(settings.trainer.iterations, 5);
        assert_eq!(settings.trainer.cv_folds, 5);
        assert_eq!(settings.trainer.vectorizer.ngram_range, (1, 3));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("TXCAT_CONFIDENCE_THRESHOLD", "0.55");
        env::set_var("TXCAT_MIN_SAMPLES_PER_CLASS", "not-a-number");
        env::set_var("TXCAT_TRAINING_ITERATIONS", "2");
        let settings = Settings::from_env();
        env::remove_var("TXCAT_CONFIDENCE_THRESHOLD");
        env::remove_var("TXCAT_MIN_SAMPLES_PER_CLASS");
        env::remove_var("TXCAT_TRAINING_ITERATIONS");

        assert_eq!(settings.predictor.confidence_threshold, 0.55);
        assert_eq!(settings.trainer.min_samples_per_class, MIN_SAMPLES_PER_CLASS);
        assert_eq!(settings.trainer.iterations, 2);
    }
}
