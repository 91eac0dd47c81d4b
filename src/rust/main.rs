use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use txcat::{Classifier, ModelStore, RuntimeConfig, Settings, Trainer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding model.json and transactions.csv (defaults to $TXCAT_HOME or the user data dir)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Give up if loading or training the model takes longer than this
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on a dataset and persist the best model
    Train {
        /// Labeled CSV with description, merchant and category columns
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Where to write the model artifact
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        min_samples: Option<usize>,
        /// Worker threads for cross-validation (0 = one per core)
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
    /// Categorize one transaction
    Predict {
        description: String,
        #[arg(long, default_value = "")]
        merchant: String,
        /// Also print the K most probable categories
        #[arg(long)]
        top: Option<usize>,
    },
    /// Categorize a fixed set of sample transactions
    Demo,
}

const DEMO_TRANSACTIONS: &[(&str, &str)] = &[
    ("bus ticket", "Metro"),
    ("electricity bill", "Power Company"),
    ("grocery shopping", "Walmart"),
    ("netflix subscription", "Netflix"),
    ("coffee", "Starbucks"),
    ("rent payment", "Apartment"),
    ("car insurance", "State Farm"),
    ("doctor visit", "Hospital"),
    ("phone bill", "Verizon"),
    ("gas fill up", "Shell"),
    ("loan payment", "Bank"),
    ("toy purchase", "Toy Store"),
    ("flight ticket", "Delta Airlines"),
    ("textbook", "Bookstore"),
    ("oil change", "Auto Shop"),
];

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = Settings::from_env();
    let home = args.home.clone().unwrap_or_else(ModelStore::get_default_model_dir);
    let timeout = args.timeout_secs.map(Duration::from_secs);

    match args.command {
        Command::Train {
            dataset,
            model,
            iterations,
            min_samples,
            threads,
        } => {
            let mut config = settings.trainer;
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(min_samples) = min_samples {
                config.min_samples_per_class = min_samples;
            }
            let trainer = Trainer::new(config).with_runtime_config(RuntimeConfig::with_threads(threads));
            let dataset = dataset.unwrap_or_else(|| home.join(txcat::model_manager::DATASET_FILE_NAME));
            let model = model.unwrap_or_else(|| home.join(txcat::model_manager::ARTIFACT_FILE_NAME));

            let start = Instant::now();
            let cancel = trainer.cancel_flag();
            let artifact = bounded(timeout, cancel, move || {
                ModelStore::train_and_save(&trainer, &dataset, &model)
            })
            .await??;
            println!("Trained in {:.2?}", start.elapsed());
            println!("Held-out accuracy: {:.3}", artifact.accuracy);
            println!("CV accuracy: {:.3} (+/- {:.3})", artifact.cv_score, artifact.cv_std);
            println!("{}", artifact.report);
        }
        Command::Predict {
            description,
            merchant,
            top,
        } => {
            let classifier = load_classifier(home, settings, timeout).await?;
            let prediction = classifier.predict_detailed(&description, &merchant)?;
            println!("Category: {}", prediction.category);
            println!("Confidence: {:.3}", prediction.confidence);
            if !prediction.accepted {
                println!(
                    "Best guess: {} ({:.3})",
                    prediction.raw_category, prediction.raw_confidence
                );
            }
            if let Some(k) = top {
                println!("Top {}:", k);
                for (category, probability) in classifier.top_k(&description, &merchant, k)? {
                    println!("  {}: {:.1}%", category, probability * 100.0);
                }
            }
        }
        Command::Demo => {
            let classifier = load_classifier(home, settings, timeout).await?;
            info!("=== Running Classifications ({} inputs) ===", DEMO_TRANSACTIONS.len());
            let start = Instant::now();
            for (description, merchant) in DEMO_TRANSACTIONS {
                let (category, confidence) = classifier.predict(description, merchant)?;
                println!("{:<24} {:<16} -> {} ({:.2})", description, merchant, category, confidence);
            }
            info!(
                "Average time per classification: {:.2?}",
                start.elapsed() / DEMO_TRANSACTIONS.len() as u32
            );
        }
    }

    Ok(())
}

/// Loads or trains the model off the async runtime, then builds the classifier
async fn load_classifier(home: PathBuf, settings: Settings, timeout: Option<Duration>) -> Result<Classifier> {
    let trainer = Trainer::new(settings.trainer);
    let cancel = trainer.cancel_flag();
    let store = Arc::new(
        ModelStore::in_dir(&home, trainer)
            .with_context(|| format!("Failed to prepare model directory {:?}", home))?,
    );

    let start = Instant::now();
    let init = Arc::clone(&store);
    bounded(timeout, cancel, move || init.get_model().map(|_| ())).await??;
    info!("Model ready in {:.2?}", start.elapsed());
    if let Some(metrics) = store.metrics() {
        info!("Accuracy: {:.3}, CV: {:.3}", metrics.accuracy, metrics.cv_score);
    }

    Ok(Classifier::builder()
        .with_config(settings.predictor)
        .with_store(&store)
        .build()?)
}

/// Runs CPU-bound work on the blocking pool, optionally bounded by `timeout`.
///
/// On timeout `cancel` is raised and the work is awaited until it notices,
/// so a cancelled training run has stopped, without persisting anything,
/// by the time this returns.
async fn bounded<T, F>(timeout: Option<Duration>, cancel: Arc<AtomicBool>, work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(work);
    let Some(limit) = timeout else {
        return task.await.context("Model initialization task failed");
    };

    match tokio::time::timeout(limit, &mut task).await {
        Ok(joined) => joined.context("Model initialization task failed"),
        Err(_) => {
            cancel.store(true, Ordering::SeqCst);
            warn!("Model initialization timed out after {:?}, stopping training", limit);
            let _ = task.await;
            Err(anyhow!("Model initialization timed out after {:?}", limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_cancels_and_waits_for_work() {
        let cancel = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let done = Arc::clone(&stopped);
        let result = bounded(Some(Duration::from_millis(20)), Arc::clone(&cancel), move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            done.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
        assert!(cancel.load(Ordering::SeqCst));
        // The work had observed the flag before the error was returned
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_work_within_limit_is_returned() {
        let cancel = Arc::new(AtomicBool::new(false));
        let value = bounded(Some(Duration::from_secs(5)), Arc::clone(&cancel), || 7).await.unwrap();
        assert_eq!(value, 7);
        assert!(!cancel.load(Ordering::SeqCst));
    }
}
