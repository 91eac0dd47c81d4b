mod common;

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use txcat::{CategoryModel, Classifier, ModelArtifact};

fn train() -> (TempDir, ModelArtifact) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dataset = common::write_dataset(dir.path());
    let artifact = common::quick_trainer()
        .train_from_path(&dataset)
        .expect("Training failed");
    (dir, artifact)
}

fn setup_test_classifier() -> Classifier {
    let (_dir, artifact) = train();
    Classifier::builder()
        .with_model(Arc::new(artifact.pipeline))
        .build()
        .expect("Failed to create classifier")
}

#[test]
fn test_training_drops_rare_categories() {
    let (_dir, artifact) = train();

    assert_eq!(artifact.training_rows, 48);
    let classes: Vec<&str> = artifact.pipeline.classes().iter().map(String::as_str).collect();
    assert_eq!(classes, common::CATEGORIES);
    assert!(!classes.contains(&"Gifts"));
    assert!((0.0..=1.0).contains(&artifact.accuracy));
    assert!((0.0..=1.0).contains(&artifact.cv_score));
}

#[test]
fn test_end_to_end_classification() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = setup_test_classifier();

    let expectations = [
        ("grocery shopping", "Walmart", "Groceries"),
        ("bus ticket", "Metro", "Transport"),
        ("electricity bill", "Power Company", "Utilities"),
        ("netflix subscription", "Netflix", "Entertainment"),
        ("gas station fuel", "Shell", "Fuel"),
    ];
    for (description, merchant, expected) in expectations {
        let prediction = classifier.predict_detailed(description, merchant)?;
        assert_eq!(prediction.raw_category, expected, "{} / {}", description, merchant);
        if prediction.accepted {
            assert_eq!(prediction.category, expected);
        } else {
            assert_eq!(prediction.category, "Other");
        }
        assert!(prediction.confidence <= prediction.raw_confidence);
    }
    Ok(())
}

#[test]
fn test_empty_input_returns_catch_all() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = setup_test_classifier();
    assert_eq!(classifier.predict("", "")?, ("Other".to_string(), 0.0));
    assert_eq!(classifier.top_k("", "", 3)?, vec![("Other".to_string(), 0.0)]);
    Ok(())
}

#[test]
fn test_prediction_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = setup_test_classifier();
    let first = classifier.predict("coffee", "Starbucks")?;
    for _ in 0..10 {
        assert_eq!(classifier.predict("coffee", "Starbucks")?, first);
    }
    Ok(())
}

#[test]
fn test_training_is_reproducible() {
    let (_a, first) = train();
    let (_b, second) = train();
    assert_eq!(first.pipeline.seed(), second.pipeline.seed());
    assert_eq!(first.cv_score, second.cv_score);
    assert_eq!(
        first.pipeline.predict_proba("coffee coffee starbucks"),
        second.pipeline.predict_proba("coffee coffee starbucks")
    );
}

#[test]
fn test_top_k() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = setup_test_classifier();

    let top = classifier.top_k("monthly bus pass", "Metro", 3)?;
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].0, "Transport");
    assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));

    let all = classifier.top_k("monthly bus pass", "Metro", 100)?;
    assert_eq!(all.len(), common::CATEGORIES.len());
    let total: f64 = all.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_thread_safety() {
    let classifier = Arc::new(setup_test_classifier());
    let expected = classifier.predict("grocery shopping", "Walmart").unwrap();

    let mut handles = vec![];
    for _ in 0..3 {
        let classifier = Arc::clone(&classifier);
        handles.push(thread::spawn(move || classifier.predict("grocery shopping", "Walmart").unwrap()));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
