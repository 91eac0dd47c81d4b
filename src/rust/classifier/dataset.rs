use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::text::build_feature_text;

pub const DESCRIPTION_COLUMN: &str = "description";
pub const MERCHANT_COLUMN: &str = "merchant";
pub const CATEGORY_COLUMN: &str = "category";

/// One labeled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub description: String,
    pub merchant: String,
    pub category: String,
}

impl TrainingExample {
    pub fn new(
        description: impl Into<String>,
        merchant: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            merchant: merchant.into(),
            category: category.into().trim().to_string(),
        }
    }
}

/// A labeled transaction dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub examples: Vec<TrainingExample>,
}

impl Dataset {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    /// Reads a CSV dataset with a header row naming the `description`,
    /// `merchant` and `category` columns (in any order).
    ///
    /// # Errors
    /// * `ClassifierError::Dataset` if the file cannot be opened or parsed
    /// * `ClassifierError::Schema` if a required column is absent
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ClassifierError::Dataset(format!("Failed to open dataset {:?}: {}", path, e))
        })?;
        info!("Reading dataset from {:?}", path);
        Self::from_reader(file)
    }

    /// Same as [`Dataset::from_path`] for any reader.
    ///
    /// Extra columns are ignored and short rows are tolerated: missing
    /// description or merchant cells become empty strings. Rows whose
    /// category is empty after trimming carry no label and are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ClassifierError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let required = [DESCRIPTION_COLUMN, MERCHANT_COLUMN, CATEGORY_COLUMN];
        let missing: Vec<String> = required
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ClassifierError::Schema { missing });
        }

        // Checked above
        let description_idx = position(DESCRIPTION_COLUMN).unwrap_or_default();
        let merchant_idx = position(MERCHANT_COLUMN).unwrap_or_default();
        let category_idx = position(CATEGORY_COLUMN).unwrap_or_default();

        let mut examples = Vec::new();
        let mut unlabeled = 0usize;
        for record in reader.records() {
            let record = record?;
            let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();

            let example = TrainingExample::new(cell(description_idx), cell(merchant_idx), cell(category_idx));
            if example.category.is_empty() {
                unlabeled += 1;
                continue;
            }
            examples.push(example);
        }

        if unlabeled > 0 {
            debug!("Skipped {} rows without a category", unlabeled);
        }
        Ok(Self { examples })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

/// Examples ready for fitting: feature texts with their categories.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
    /// Example count per surviving category
    pub distribution: BTreeMap<String, usize>,
    /// Categories dropped for having too few examples
    pub dropped_categories: Vec<String>,
    /// Examples dropped because their feature text was empty
    pub empty_texts: usize,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.distribution.len()
    }
}

/// Builds feature texts, drops examples without signal and drops every
/// category with fewer than `min_samples_per_class` examples.
///
/// # Errors
/// * `ClassifierError::InsufficientData` if fewer than two categories remain
pub fn prepare(
    examples: &[TrainingExample],
    min_samples_per_class: usize,
) -> Result<PreparedData, ClassifierError> {
    let mut rows: Vec<(String, String)> = Vec::with_capacity(examples.len());
    let mut empty_texts = 0usize;
    for example in examples {
        let category = example.category.trim();
        if category.is_empty() {
            continue;
        }
        let text = build_feature_text(&example.description, &example.merchant);
        if text.is_empty() {
            empty_texts += 1;
            continue;
        }
        rows.push((text, category.to_string()));
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, category) in &rows {
        *counts.entry(category.clone()).or_insert(0) += 1;
    }

    let dropped_categories: Vec<String> = counts
        .iter()
        .filter(|&(_, &count)| count < min_samples_per_class)
        .map(|(category, _)| category.clone())
        .collect();
    counts.retain(|_, count| *count >= min_samples_per_class);

    let (texts, labels): (Vec<String>, Vec<String>) = rows
        .into_iter()
        .filter(|(_, category)| counts.contains_key(category))
        .unzip();

    if !dropped_categories.is_empty() {
        info!(
            "Dropped {} categories with fewer than {} examples: {}",
            dropped_categories.len(),
            min_samples_per_class,
            dropped_categories.join(", ")
        );
    }

    if counts.len() < 2 {
        return Err(ClassifierError::InsufficientData(format!(
            "{} categor{} left after filtering (need at least 2)",
            counts.len(),
            if counts.len() == 1 { "y" } else { "ies" }
        )));
    }

    Ok(PreparedData {
        texts,
        labels,
        distribution: counts,
        dropped_categories,
        empty_texts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader_any_column_order() -> Result<(), ClassifierError> {
        let csv = "category,amount,merchant,description\n\
                   Food,12.50,Starbucks,coffee\n\
                   Transport ,3.00,Metro,bus ticket\n";
        let dataset = Dataset::from_reader(csv.as_bytes())?;
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.examples[0], TrainingExample::new("coffee", "Starbucks", "Food"));
        assert_eq!(dataset.examples[1].category, "Transport");
        Ok(())
    }

    #[test]
    fn test_from_reader_missing_cells_and_labels() -> Result<(), ClassifierError> {
        let csv = "description,merchant,category\n\
                   ,Shell,Fuel\n\
                   rent payment,,Housing\n\
                   mystery,Shop,\n";
        let dataset = Dataset::from_reader(csv.as_bytes())?;
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.examples[0].description, "");
        assert_eq!(dataset.examples[1].merchant, "");
        Ok(())
    }

    #[test]
    fn test_schema_error() {
        let csv = "description,category\ncoffee,Food\n";
        match Dataset::from_reader(csv.as_bytes()) {
            Err(ClassifierError::Schema { missing }) => assert_eq!(missing, vec!["merchant"]),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = Dataset::from_path("/nonexistent/txcat/transactions.csv");
        assert!(matches!(result, Err(ClassifierError::Dataset(_))));
    }

    #[test]
    fn test_prepare_drops_weak_classes_and_empty_text() -> Result<(), ClassifierError> {
        let mut examples = Vec::new();
        for _ in 0..5 {
            examples.push(TrainingExample::new("coffee", "Starbucks", "Food"));
            examples.push(TrainingExample::new("bus ticket", "Metro", "Transport"));
        }
        examples.push(TrainingExample::new("toy", "Toy Store", "Kids"));
        examples.push(TrainingExample::new("???", "", "Food"));

        let prepared = prepare(&examples, 3)?;
        assert_eq!(prepared.len(), 10);
        assert_eq!(prepared.num_classes(), 2);
        assert_eq!(prepared.dropped_categories, vec!["Kids"]);
        assert_eq!(prepared.empty_texts, 1);
        assert!(!prepared.labels.iter().any(|l| l == "Kids"));
        assert_eq!(prepared.texts[0], "coffee coffee starbucks");
        Ok(())
    }

    #[test]
    fn test_prepare_single_class_is_insufficient() {
        let mut examples = Vec::new();
        for _ in 0..5 {
            examples.push(TrainingExample::new("coffee", "Starbucks", "A"));
        }
        examples.push(TrainingExample::new("bus", "Metro", "B"));
        let result = prepare(&examples, 3);
        assert!(matches!(result, Err(ClassifierError::InsufficientData(_))));
    }
}
