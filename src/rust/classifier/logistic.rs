use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use ndarray::{Array1, Array2, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{softmax, SparseVector};
use crate::config::RegressionConfig;

/// Multinomial logistic regression with elastic-net regularization.
///
/// Fitted with seeded mini-batch proximal SGD: each step takes a gradient
/// step on the class-weighted cross-entropy of one batch, shrinks the
/// weights for the L2 part of the penalty and soft-thresholds them for the
/// L1 part. The penalty is applied lazily: a feature column only catches up
/// on the steps it missed when a batch reads it, and every column is settled
/// at the end of the epoch. Class weight rows are updated in parallel. The
/// seed only decides the sample order of every epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: RegressionConfig,
    seed: u64,
    /// Sorted class labels; row `i` of `weights` belongs to `classes[i]`
    classes: Vec<String>,
    weights: Array2<f64>,
    intercept: Array1<f64>,
    epochs_run: usize,
}

impl LogisticRegression {
    pub fn new(config: RegressionConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            classes: Vec::new(),
            weights: Array2::zeros((0, 0)),
            intercept: Array1::zeros(0),
            epochs_run: 0,
        }
    }

    /// Fits the model on `samples` with matching `labels`.
    ///
    /// # Arguments
    /// * `samples` - Feature vectors whose indices are below `n_features`
    /// * `labels` - Class label of each sample
    /// * `n_features` - Width of the feature space
    ///
    /// # Errors
    /// * `ClassifierError::Training` if there are no samples or the number of
    ///   labels does not match the number of samples
    pub fn fit(
        &mut self,
        samples: &[SparseVector],
        labels: &[&str],
        n_features: usize,
    ) -> Result<(), ClassifierError> {
        self.fit_until(samples, labels, n_features, &AtomicBool::new(false))
    }

    /// Like [`fit`](Self::fit), but gives up with `ClassifierError::Cancelled`
    /// at the next epoch boundary once `cancel` is set.
    pub fn fit_until(
        &mut self,
        samples: &[SparseVector],
        labels: &[&str],
        n_features: usize,
        cancel: &AtomicBool,
    ) -> Result<(), ClassifierError> {
        if samples.is_empty() {
            return Err(ClassifierError::Training("Cannot fit a classifier without samples".into()));
        }
        if samples.len() != labels.len() {
            return Err(ClassifierError::Training(format!(
                "Got {} samples but {} labels",
                samples.len(),
                labels.len()
            )));
        }

        self.classes = labels
            .iter()
            .map(|l| l.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = samples.len();
        let k = self.classes.len();
        self.weights = Array2::zeros((k, n_features));
        self.intercept = Array1::zeros(k);
        self.epochs_run = 0;

        if k == 1 {
            debug!("Single class '{}', nothing to optimize", self.classes[0]);
            return Ok(());
        }

        let targets: Vec<usize> = labels
            .iter()
            .map(|l| self.class_index(l).unwrap_or_default())
            .collect();
        let class_weights = self.class_weights(&targets, n);

        let lambda = 1.0 / (self.config.c * n as f64);
        let batch_size = self.config.batch_size.max(1);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();

        // Steps whose penalty each feature column has already received this epoch
        let mut settled = vec![0usize; n_features];
        let mut previous_weights = Array2::<f64>::zeros((k, n_features));
        let mut previous_intercept = Array1::<f64>::zeros(k);

        for epoch in 0..self.config.max_epochs {
            if cancel.load(Ordering::Relaxed) {
                debug!("Cancelled after {} epochs (seed {})", self.epochs_run, self.seed);
                return Err(ClassifierError::Cancelled);
            }

            order.shuffle(&mut rng);
            let eta = self.config.learning_rate / (1.0 + self.config.decay * epoch as f64);
            let penalty = Penalty {
                shrink: 1.0 - eta * lambda * (1.0 - self.config.l1_ratio),
                threshold: eta * lambda * self.config.l1_ratio,
            };

            previous_weights.assign(&self.weights);
            previous_intercept.assign(&self.intercept);
            settled.iter_mut().for_each(|s| *s = 0);

            let mut step = 0;
            for batch in order.chunks(batch_size) {
                let mut touched: Vec<usize> = batch
                    .iter()
                    .flat_map(|&i| samples[i].entries.iter().map(|&(j, _)| j))
                    .collect();
                touched.sort_unstable();
                touched.dedup();

                // Bring the batch's columns up to date before they are read
                let settled_ref = &settled;
                Zip::from(self.weights.rows_mut()).par_for_each(|mut w| {
                    for &j in &touched {
                        w[j] = penalty.apply(w[j], step - settled_ref[j]);
                    }
                });
                for &j in &touched {
                    settled[j] = step;
                }

                // residual[[row, c]] = weighted (p_c - y_c) of the row-th sample
                let mut residual = Array2::<f64>::zeros((batch.len(), k));
                for (row, &i) in batch.iter().enumerate() {
                    let mut proba = self.decision_function(&samples[i]);
                    softmax(&mut proba);
                    let weight = class_weights[targets[i]] / batch.len() as f64;
                    for (c, p) in proba.into_iter().enumerate() {
                        let y = if c == targets[i] { 1.0 } else { 0.0 };
                        residual[[row, c]] = weight * (p - y);
                    }
                }

                Zip::from(self.weights.rows_mut())
                    .and(&mut self.intercept)
                    .and(residual.columns())
                    .par_for_each(|mut w, b, res| {
                        for (row, &i) in batch.iter().enumerate() {
                            let r = res[row];
                            if r == 0.0 {
                                continue;
                            }
                            for &(j, x) in &samples[i].entries {
                                w[j] -= eta * r * x;
                            }
                            *b -= eta * r;
                        }
                    });
                step += 1;
            }

            // Every column owes the penalty of the steps since it was last touched
            let settled_ref = &settled;
            Zip::from(self.weights.rows_mut()).par_for_each(|mut w| {
                for (j, v) in w.iter_mut().enumerate() {
                    *v = penalty.apply(*v, step - settled_ref[j]);
                }
            });

            self.epochs_run = epoch + 1;
            let change = max_abs_diff(self.weights.iter(), previous_weights.iter())
                .max(max_abs_diff(self.intercept.iter(), previous_intercept.iter()));
            if change < self.config.tolerance {
                debug!("Converged after {} epochs (seed {})", self.epochs_run, self.seed);
                break;
            }
        }

        if self.epochs_run == self.config.max_epochs {
            debug!(
                "Stopped after max_epochs={} without converging (seed {})",
                self.config.max_epochs, self.seed
            );
        }
        Ok(())
    }

    /// Raw per-class scores (logits) in `classes` order
    pub fn decision_function(&self, x: &SparseVector) -> Vec<f64> {
        self.weights
            .outer_iter()
            .zip(self.intercept.iter())
            .map(|(w, &b)| {
                b + x
                    .entries
                    .iter()
                    .filter(|&&(j, _)| j < w.len())
                    .map(|&(j, v)| w[j] * v)
                    .sum::<f64>()
            })
            .collect()
    }

    /// Class probabilities in `classes` order
    pub fn predict_proba(&self, x: &SparseVector) -> Vec<f64> {
        let mut scores = self.decision_function(x);
        softmax(&mut scores);
        scores
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    /// Number of non-zero feature weights across all classes
    pub fn nonzero_weights(&self) -> usize {
        self.weights.iter().filter(|&&w| w != 0.0).count()
    }

    fn class_index(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    fn class_weights(&self, targets: &[usize], n: usize) -> Vec<f64> {
        let k = self.classes.len();
        if !self.config.balanced {
            return vec![1.0; k];
        }
        let mut counts = vec![0usize; k];
        for &t in targets {
            counts[t] += 1;
        }
        counts
            .into_iter()
            .map(|count| if count == 0 { 0.0 } else { n as f64 / (k * count) as f64 })
            .collect()
    }
}

/// The elastic-net proximal step of one epoch: `v -> soft_threshold(v * shrink, threshold)`
#[derive(Debug, Clone, Copy)]
struct Penalty {
    shrink: f64,
    threshold: f64,
}

impl Penalty {
    /// Applies the step `steps` times in closed form.
    ///
    /// Until it is clipped to zero the magnitude follows
    /// `|v| * s^m - t * (1 + s + ... + s^(m-1))`, and zero is a fixed point.
    fn apply(&self, v: f64, steps: usize) -> f64 {
        if steps == 0 || v == 0.0 {
            return v;
        }
        if steps == 1 {
            return soft_threshold(v * self.shrink, self.threshold);
        }
        let decay = self.shrink.powi(steps as i32);
        let total_threshold = if self.shrink < 1.0 {
            self.threshold * (1.0 - decay) / (1.0 - self.shrink)
        } else {
            self.threshold * steps as f64
        };
        let magnitude = v.abs() * decay - total_threshold;
        if magnitude > 0.0 {
            magnitude.copysign(v)
        } else {
            0.0
        }
    }
}

fn soft_threshold(v: f64, threshold: f64) -> f64 {
    if v > threshold {
        v - threshold
    } else if v < -threshold {
        v + threshold
    } else {
        0.0
    }
}

fn max_abs_diff<'a>(a: impl Iterator<Item = &'a f64>, b: impl Iterator<Item = &'a f64>) -> f64 {
    a.zip(b).fold(0.0, |m, (x, y)| m.max((x - y).abs()))
}
