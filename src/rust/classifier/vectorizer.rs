use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::stop_words::is_stop_word;
use super::utils::{normalize_vector, SparseVector};
use crate::config::VectorizerConfig;

/// TF-IDF vectorizer over word n-grams.
///
/// Tokens are runs of at least two word characters. Stop-words are removed
/// before n-grams are formed, so "cup of coffee" yields the bigram
/// "cup coffee".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    config: VectorizerConfig,
    /// term -> column index, indices assigned in lexicographic term order
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
        }
    }

    /// Learns the vocabulary and inverse document frequencies of `documents`.
    ///
    /// # Errors
    /// * `ClassifierError::Training` if `documents` is empty or no term
    ///   survives the document-frequency pruning
    pub fn fit(&mut self, documents: &[&str]) -> Result<(), ClassifierError> {
        if documents.is_empty() {
            return Err(ClassifierError::Training("Cannot fit vectorizer on an empty corpus".into()));
        }
        let n_docs = documents.len();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        let mut term_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let terms = self.analyze(doc);
            let unique: BTreeSet<&String> = terms.iter().collect();
            for term in unique {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = self.config.max_df * n_docs as f64;
        let mut kept: Vec<(&String, usize)> = document_frequency
            .iter()
            .filter(|&(_, &df)| df >= self.config.min_df && (df as f64) <= max_doc_count)
            .map(|(term, _)| (term, term_frequency[term]))
            .collect();

        if kept.len() > self.config.max_features {
            // Highest corpus frequency first, ties in term order
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.truncate(self.config.max_features);
        }

        if kept.is_empty() {
            return Err(ClassifierError::Training(
                "After pruning, no terms remain. Try a lower min_df or a higher max_df".into(),
            ));
        }

        let terms: BTreeSet<&String> = kept.into_iter().map(|(term, _)| term).collect();
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();

        self.idf = self
            .vocabulary
            .keys()
            .map(|term| {
                let df = document_frequency[term] as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        debug!(
            "Vectorizer fitted on {} documents: {} of {} terms kept",
            n_docs,
            self.vocabulary.len(),
            document_frequency.len()
        );
        Ok(())
    }

    /// Converts a document into an L2-normalized TF-IDF vector.
    ///
    /// Terms outside the vocabulary are ignored; a document with no known
    /// terms yields an empty vector.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for term in self.analyze(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let mut vector = SparseVector {
            entries: counts
                .into_iter()
                .map(|(idx, count)| {
                    let tf = if self.config.sublinear_tf {
                        1.0 + (count as f64).ln()
                    } else {
                        count as f64
                    };
                    (idx, tf * self.idf[idx])
                })
                .collect(),
        };
        normalize_vector(&mut vector);
        vector
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    fn analyze(&self, document: &str) -> Vec<String> {
        let tokens: Vec<&str> = document
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| !(self.config.stop_words && is_stop_word(t)))
            .collect();

        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }
}
