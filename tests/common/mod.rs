#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use txcat::{Trainer, TrainerConfig};

pub const CATEGORIES: &[&str] = &["Dining", "Entertainment", "Fuel", "Groceries", "Transport", "Utilities"];

const ROWS: &[(&str, &str, &str)] = &[
    ("grocery shopping", "Walmart", "Groceries"),
    ("weekly grocery run", "Kroger", "Groceries"),
    ("grocery store purchase", "Walmart", "Groceries"),
    ("fresh produce groceries", "Whole Foods", "Groceries"),
    ("grocery delivery", "Instacart", "Groceries"),
    ("supermarket grocery", "Safeway", "Groceries"),
    ("grocery shopping trip", "Kroger", "Groceries"),
    ("bulk grocery shopping", "Costco", "Groceries"),
    ("bus ticket", "Metro", "Transport"),
    ("monthly bus pass", "Metro", "Transport"),
    ("train ticket", "Amtrak", "Transport"),
    ("subway fare", "Metro", "Transport"),
    ("taxi ride", "Uber", "Transport"),
    ("ride to airport", "Uber", "Transport"),
    ("bus fare", "Greyhound", "Transport"),
    ("metro card refill", "Metro", "Transport"),
    ("electricity bill", "Power Company", "Utilities"),
    ("water bill", "City Water", "Utilities"),
    ("monthly electricity bill", "Power Company", "Utilities"),
    ("internet bill", "Comcast", "Utilities"),
    ("gas utility bill", "Power Company", "Utilities"),
    ("phone bill", "Verizon", "Utilities"),
    ("electric bill payment", "Power Company", "Utilities"),
    ("sewer and water bill", "City Water", "Utilities"),
    ("netflix subscription", "Netflix", "Entertainment"),
    ("movie tickets", "AMC", "Entertainment"),
    ("streaming subscription", "Netflix", "Entertainment"),
    ("concert tickets", "Ticketmaster", "Entertainment"),
    ("music streaming subscription", "Spotify", "Entertainment"),
    ("movie night", "AMC", "Entertainment"),
    ("video game purchase", "Steam", "Entertainment"),
    ("theater tickets", "Ticketmaster", "Entertainment"),
    ("coffee", "Starbucks", "Dining"),
    ("morning coffee", "Starbucks", "Dining"),
    ("lunch restaurant", "Chipotle", "Dining"),
    ("dinner restaurant", "Olive Garden", "Dining"),
    ("coffee and pastry", "Starbucks", "Dining"),
    ("pizza dinner", "Dominos", "Dining"),
    ("restaurant lunch", "Subway Sandwiches", "Dining"),
    ("iced coffee", "Dunkin", "Dining"),
    ("gas fill up", "Shell", "Fuel"),
    ("gas station fuel", "Chevron", "Fuel"),
    ("fuel refill", "Shell", "Fuel"),
    ("diesel fuel", "Exxon", "Fuel"),
    ("gas station", "BP", "Fuel"),
    ("fuel purchase", "Chevron", "Fuel"),
    ("gas fill up", "Exxon", "Fuel"),
    ("petrol fuel", "Shell", "Fuel"),
    ("birthday gift", "Etsy", "Gifts"),
    ("wedding gift", "Amazon", "Gifts"),
];

/// Writes the fixture dataset as `transactions.csv` in `dir`, with a few
/// malformed rows mixed in.
pub fn write_dataset(dir: &Path) -> PathBuf {
    let mut csv = String::from("category,merchant,description,notes\n");
    for (description, merchant, category) in ROWS {
        csv.push_str(&format!("{},{},\"{}\",\n", category, merchant, description));
    }
    // No category: skipped
    csv.push_str(",Walmart,grocery shopping,\n");
    // No usable text: kept out of training
    csv.push_str("Groceries,,\"!!!\",\n");

    let path = dir.join("transactions.csv");
    fs::write(&path, csv).expect("Failed to write dataset");
    path
}

pub fn quick_trainer() -> Trainer {
    Trainer::new(TrainerConfig {
        iterations: 2,
        ..TrainerConfig::default()
    })
}
