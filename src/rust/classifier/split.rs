//! Stratified partitioning of labeled examples.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Indices of a train/held-out partition
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn indices_by_class<S: AsRef<str>>(labels: &[S]) -> BTreeMap<&str, Vec<usize>> {
    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(label.as_ref()).or_default().push(i);
    }
    by_class
}

/// Splits example indices into train and held-out sets, preserving class
/// ratios.
///
/// Every class with at least two examples contributes
/// `max(1, round(n_c * test_ratio))` examples to the held-out set and keeps
/// at least one for training. The same `seed` always yields the same split.
pub fn stratified_split<S: AsRef<str>>(labels: &[S], test_ratio: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut indices) in indices_by_class(labels) {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1)
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Split { train, test }
}

/// Assigns examples to `k` stratified folds and returns one split per
/// non-empty fold.
///
/// Each class's examples are dealt round-robin across the folds in order,
/// continuing where the previous class stopped, so fold sizes differ by at
/// most one and no shuffling is involved.
pub fn stratified_folds<S: AsRef<str>>(labels: &[S], k: usize) -> Vec<Split> {
    let k = k.min(labels.len());
    if k < 2 {
        return Vec::new();
    }

    let mut fold_of = vec![0usize; labels.len()];
    let mut next = 0usize;
    for (_, indices) in indices_by_class(labels) {
        for i in indices {
            fold_of[i] = next % k;
            next += 1;
        }
    }

    (0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            Split { train, test }
        })
        .filter(|split| !split.test.is_empty() && !split.train.is_empty())
        .collect()
}
