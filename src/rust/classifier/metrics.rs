//! Evaluation metrics for fitted pipelines.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fraction of predictions equal to the expected label. Empty input scores 0.
pub fn accuracy<A: AsRef<str>, B: AsRef<str>>(predicted: &[A], expected: &[B]) -> f64 {
    assert_eq!(
        predicted.len(),
        expected.len(),
        "predictions and labels must have same length"
    );
    if expected.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(expected.iter())
        .filter(|(p, e)| p.as_ref() == e.as_ref())
        .count();
    correct as f64 / expected.len() as f64
}

/// Mean and population standard deviation of `scores`
pub fn mean_and_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Precision, recall and F1 of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics over a labeled evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub support: usize,
}

impl ClassificationReport {
    /// Computes the report over every label seen in either `predicted` or
    /// `expected`. Undefined ratios (no predictions, no support) count as 0.
    pub fn new<A: AsRef<str>, B: AsRef<str>>(predicted: &[A], expected: &[B]) -> Self {
        let labels: BTreeSet<&str> = predicted
            .iter()
            .map(|p| p.as_ref())
            .chain(expected.iter().map(|e| e.as_ref()))
            .collect();

        let classes: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let mut tp = 0usize;
                let mut fp = 0usize;
                let mut fn_count = 0usize;
                for (p, e) in predicted.iter().zip(expected.iter()) {
                    match (p.as_ref() == label, e.as_ref() == label) {
                        (true, true) => tp += 1,
                        (true, false) => fp += 1,
                        (false, true) => fn_count += 1,
                        (false, false) => {}
                    }
                }
                let precision = ratio(tp, tp + fp);
                let recall = ratio(tp, tp + fn_count);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support: tp + fn_count,
                }
            })
            .collect();

        let n = classes.len().max(1) as f64;
        Self {
            accuracy: accuracy(predicted, expected),
            macro_precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            macro_recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            macro_f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: expected.len(),
            classes,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("macro avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support)?;
        write!(
            f,
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, self.support
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&["a", "b", "a", "c"], &["a", "b", "b", "c"]), 0.75);
        assert_eq!(accuracy::<&str, &str>(&[], &[]), 0.0);
    }

    #[test]
    fn test_mean_and_std() {
        let (mean, std) = mean_and_std(&[0.5, 1.0]);
        assert!((mean - 0.75).abs() < 1e-12);
        assert!((std - 0.25).abs() < 1e-12);
        assert_eq!(mean_and_std(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_classification_report() {
        let predicted = ["Food", "Food", "Travel", "Travel"];
        let expected = ["Food", "Travel", "Travel", "Travel"];
        let report = ClassificationReport::new(&predicted, &expected);

        assert_eq!(report.classes.len(), 2);
        let food = &report.classes[0];
        assert_eq!(food.label, "Food");
        assert_eq!(food.precision, 0.5);
        assert_eq!(food.recall, 1.0);
        assert_eq!(food.support, 1);
        let travel = &report.classes[1];
        assert_eq!(travel.precision, 1.0);
        assert!((travel.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.accuracy, 0.75);

        let rendered = report.to_string();
        assert!(rendered.contains("precision"));
        assert!(rendered.contains("Travel"));
        assert!(rendered.contains("macro avg"));
    }
}
