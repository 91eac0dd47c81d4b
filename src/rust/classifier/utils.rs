use serde::{Deserialize, Serialize};

/// A sparse feature vector: `(feature index, value)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn normalize_vector(vec: &mut SparseVector) {
    let norm: f64 = vec.entries.iter().map(|&(_, x)| x * x).sum::<f64>().sqrt();
    if norm > 1e-10 {
        for (_, x) in vec.entries.iter_mut() {
            *x /= norm;
        }
    } else {
        vec.entries.clear();
    }
}

/// Numerically stable softmax, in place.
pub(crate) fn softmax(scores: &mut [f64]) {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vector() {
        let mut v = SparseVector { entries: vec![(0, 3.0), (4, 4.0)] };
        normalize_vector(&mut v);
        assert!((v.entries[0].1 - 0.6).abs() < 1e-12);
        assert!((v.entries[1].1 - 0.8).abs() < 1e-12);

        let mut zero = SparseVector { entries: vec![(1, 0.0)] };
        normalize_vector(&mut zero);
        assert!(zero.is_empty());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut scores = vec![1000.0, 1001.0, 999.0];
        softmax(&mut scores);
        let sum: f64 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(scores[1] > scores[0] && scores[0] > scores[2]);
    }
}
