use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::dataset::{prepare, Dataset};
use super::error::ClassifierError;
use super::metrics::{accuracy, mean_and_std, ClassificationReport};
use super::pipeline::Pipeline;
use super::split::{stratified_folds, stratified_split, Split};
use crate::config::TrainerConfig;
use crate::runtime::{create_thread_pool, RuntimeConfig};

/// The outcome of a training run: the selected pipeline and how it scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub pipeline: Pipeline,
    /// Accuracy on the held-out partition
    pub accuracy: f64,
    /// Mean k-fold cross-validation accuracy on the training partition
    pub cv_score: f64,
    pub cv_std: f64,
    /// Held-out evaluation of the selected pipeline
    pub report: ClassificationReport,
    /// Number of examples that survived filtering
    pub training_rows: usize,
}

/// Scores of one candidate pipeline
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub seed: u64,
    pub accuracy: f64,
    pub cv_scores: Vec<f64>,
}

/// Trains several seeded candidate pipelines and keeps the one with the best
/// cross-validation score.
///
/// A run can be stopped from another thread through [`Trainer::cancel_flag`];
/// it then ends with `ClassifierError::Cancelled` at the next candidate, fold
/// or epoch boundary.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
    runtime: RuntimeConfig,
    cancel: Arc<AtomicBool>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            runtime: RuntimeConfig::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the thread configuration used for cross-validation and fitting
    pub fn with_runtime_config(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Shares `cancel` with the caller instead of the trainer's own flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The flag that stops a running `train` when set. Clones of this trainer
    /// share it.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn check_cancelled(&self) -> Result<(), ClassifierError> {
        if self.is_cancelled() {
            return Err(ClassifierError::Cancelled);
        }
        Ok(())
    }

    /// Reads the CSV dataset at `path` and trains on it.
    pub fn train_from_path<P: AsRef<Path>>(&self, path: P) -> Result<ModelArtifact, ClassifierError> {
        let dataset = Dataset::from_path(path)?;
        self.train(&dataset)
    }

    /// Runs a full training session on `dataset`.
    ///
    /// The examples are filtered, split once into a stratified 80/20
    /// train/held-out partition, and `iterations` candidates are fitted with
    /// seeds `base_seed + i`. Each candidate is scored on the held-out set and
    /// by k-fold cross-validation on the training partition; the highest
    /// cross-validation mean wins (the earlier candidate on ties).
    ///
    /// # Errors
    /// * `ClassifierError::InsufficientData` if fewer than two categories
    ///   survive the minimum-samples filter
    /// * `ClassifierError::Training` if a candidate cannot be fitted
    /// * `ClassifierError::Validation` if `iterations` is zero
    /// * `ClassifierError::Cancelled` if the cancel flag was set
    pub fn train(&self, dataset: &Dataset) -> Result<ModelArtifact, ClassifierError> {
        if self.config.iterations == 0 {
            return Err(ClassifierError::Validation("At least one training iteration is required".into()));
        }
        let pool = create_thread_pool(&self.runtime)?;
        pool.install(|| self.train_candidates(dataset))
    }

    fn train_candidates(&self, dataset: &Dataset) -> Result<ModelArtifact, ClassifierError> {
        let start = Instant::now();
        let prepared = prepare(&dataset.examples, self.config.min_samples_per_class)?;

        info!("Training rows: {}", prepared.len());
        info!("Categories: {}", prepared.num_classes());
        for (category, count) in &prepared.distribution {
            info!("  {}: {}", category, count);
        }
        if prepared.empty_texts > 0 {
            info!("Ignored {} rows without usable text", prepared.empty_texts);
        }

        let split = stratified_split(&prepared.labels, self.config.test_ratio, self.config.split_seed);
        let (train_texts, train_labels) = select(&prepared.texts, &prepared.labels, &split.train);
        let (test_texts, test_labels) = select(&prepared.texts, &prepared.labels, &split.test);
        let folds = stratified_folds(&train_labels, self.config.cv_folds);
        debug!(
            "Split: train={} test={} folds={}",
            train_texts.len(),
            test_texts.len(),
            folds.len()
        );

        info!("Training {} models to find the best...", self.config.iterations);
        let mut best: Option<(Pipeline, CandidateScore)> = None;
        for iteration in 0..self.config.iterations {
            let seed = self.config.base_seed + iteration as u64;
            self.check_cancelled()?;
            info!("--- Iteration {}/{} (seed {}) ---", iteration + 1, self.config.iterations, seed);

            let pipeline = Pipeline::fit_until(
                &train_texts,
                &train_labels,
                &self.config.vectorizer,
                &self.config.regression,
                seed,
                &self.cancel,
            )?;
            let score = CandidateScore {
                seed,
                accuracy: held_out_accuracy(&pipeline, &test_texts, &test_labels),
                cv_scores: self.cross_validate(&train_texts, &train_labels, &folds, seed)?,
            };

            let (cv_mean, cv_std) = mean_and_std(&score.cv_scores);
            info!("Test accuracy: {:.3}", score.accuracy);
            info!("CV accuracy: {:.3} (+/- {:.3})", cv_mean, cv_std);

            let improved = match &best {
                Some((_, current)) => cv_mean > mean_and_std(&current.cv_scores).0,
                None => true,
            };
            if improved {
                info!("New best model (seed {})", seed);
                best = Some((pipeline, score));
            }
        }

        let (pipeline, score) = best
            .ok_or_else(|| ClassifierError::Training("No candidate pipeline was trained".into()))?;
        let (cv_score, cv_std) = mean_and_std(&score.cv_scores);

        let predicted: Vec<&str> = test_texts.iter().map(|t| pipeline.predict(t)).collect();
        let report = ClassificationReport::new(&predicted, &test_labels);

        info!("Best model selected (seed {}):", score.seed);
        info!("  Test accuracy: {:.3}", score.accuracy);
        info!("  CV accuracy: {:.3}", cv_score);
        info!("Classification report:\n{}", report);
        info!("Training finished in {:.2?}", start.elapsed());

        Ok(ModelArtifact {
            pipeline,
            accuracy: score.accuracy,
            cv_score,
            cv_std,
            report,
            training_rows: prepared.len(),
        })
    }

    /// Accuracy of a candidate configuration on every fold, folds fitted in
    /// parallel.
    ///
    /// A fold whose pipeline cannot be fitted (typically a vocabulary pruned
    /// to nothing on a small fold) is logged and left out of the scores.
    fn cross_validate(
        &self,
        texts: &[&str],
        labels: &[&str],
        folds: &[Split],
        seed: u64,
    ) -> Result<Vec<f64>, ClassifierError> {
        let results: Vec<Result<f64, ClassifierError>> = folds
            .par_iter()
            .map(|fold| {
                self.check_cancelled()?;
                let (fold_texts, fold_labels) = select(texts, labels, &fold.train);
                let (val_texts, val_labels) = select(texts, labels, &fold.test);
                let pipeline = Pipeline::fit_until(
                    &fold_texts,
                    &fold_labels,
                    &self.config.vectorizer,
                    &self.config.regression,
                    seed,
                    &self.cancel,
                )?;
                Ok(held_out_accuracy(&pipeline, &val_texts, &val_labels))
            })
            .collect();

        let mut scores = Vec::with_capacity(results.len());
        for (fold, result) in results.into_iter().enumerate() {
            match result {
                Ok(score) => scores.push(score),
                Err(ClassifierError::Cancelled) => return Err(ClassifierError::Cancelled),
                Err(e) => warn!("Skipping cross-validation fold {} (seed {}): {}", fold + 1, seed, e),
            }
        }
        if scores.is_empty() && !folds.is_empty() {
            return Err(ClassifierError::Training(format!(
                "Every cross-validation fold failed (seed {})",
                seed
            )));
        }
        Ok(scores)
    }
}

fn select<'a, S: AsRef<str>>(texts: &'a [S], labels: &'a [S], indices: &[usize]) -> (Vec<&'a str>, Vec<&'a str>) {
    indices
        .iter()
        .map(|&i| (texts[i].as_ref(), labels[i].as_ref()))
        .unzip()
}

fn held_out_accuracy(pipeline: &Pipeline, texts: &[&str], labels: &[&str]) -> f64 {
    let predicted: Vec<&str> = texts.par_iter().map(|t| pipeline.predict(t)).collect();
    accuracy(&predicted, labels)
}
