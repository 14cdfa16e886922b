//! House price preprocessing with stateful column units.
//!
//! This example walks through a typical train/serve split:
//! - Loading a mixed-type CSV (numerical + categorical columns)
//! - Imputing missing values, standardizing numbers, encoding categories
//! - Persisting the trained units and loading them for inference
//! - Replaying the training statistics on new rows
//!
//! # Columns:
//! - sqft (numerical, needs scaling)
//! - bedrooms (numerical, may be missing)
//! - bathrooms (numerical, needs scaling)
//! - neighborhood (categorical, ordinal encoded)
//! - price (target, left untouched)
//!
//! Run with: RUST_LOG=datastep=debug cargo run --example house_price_pipeline

use datastep::cells::{impute, ordinal_encode, standardize, ImputeStrategy};
use datastep::{
    make_column_transformation, ColumnSpec, DataFrame, Dataset, FunctionRegistry, Params, TransformUnit,
    UnitConfig,
};
use std::error::Error;
use tracing_subscriber::EnvFilter;

const TRAIN_CSV: &str = "\
sqft,bedrooms,bathrooms,neighborhood,price
1500,3,2,downtown,350
2000,4,3,suburban,450
1200,2,1,rural,180
1800,3,2,downtown,420
2200,4,3,suburban,480
1100,2,1,rural,150
2500,5,4,downtown,550
1400,3,2,suburban,280
1600,,2,downtown,360
1900,,3,suburban,410
";

const NEW_CSV: &str = "\
sqft,bedrooms,bathrooms,neighborhood,price
1700,3,2,suburban,
2400,,3,rural,
1300,2,1,harbour,
";

const NUMERICAL: [&str; 3] = ["sqft", "bedrooms", "bathrooms"];

fn print_frame(title: &str, frame: &DataFrame) {
    println!("{}", title);
    for (name, values) in frame.iter() {
        let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        println!("  {:<13} {}", name, rendered.join(", "));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== House Price Preprocessing ===\n");

    // 1. Register the transformations so trained units can be persisted
    let mut registry = FunctionRegistry::new();
    registry
        .register("impute_mean", make_column_transformation(impute(ImputeStrategy::Mean), false))
        .register("standardize", make_column_transformation(standardize(), false))
        .register("ordinal", make_column_transformation(ordinal_encode(), false));

    let mut imputer = TransformUnit::from_registry(&registry, Some("impute_mean"), None, UnitConfig::default())?;
    let mut scaler = TransformUnit::from_registry(&registry, Some("standardize"), None, UnitConfig::default())?;
    let mut encoder = TransformUnit::from_registry(&registry, Some("ordinal"), None, UnitConfig::default())?;

    // 2. Load training data
    let mut train = DataFrame::from_csv_reader(TRAIN_CSV.as_bytes(), b',')?.named("train");
    println!(
        "Training data: {} rows, {} columns\n",
        train.n_rows(),
        train.column_count()
    );

    // 3. Train each unit on its own columns
    let numerical = Params::new().columns(ColumnSpec::names(NUMERICAL));
    let categorical = Params::new().columns(ColumnSpec::names(["neighborhood"]));

    imputer.run(&mut train, &numerical)?;
    scaler.run(&mut train, &numerical)?;
    encoder.run(&mut train, &categorical)?;
    print_frame("Preprocessed training data:", &train);

    println!("\nLearned state:");
    println!("  imputer: {}", serde_json::Value::Object(imputer.input()));
    println!("  encoder: {}", serde_json::Value::Object(encoder.input()));

    // 4. Save the trained units
    let dir = std::env::temp_dir().join("datastep_house_prices");
    std::fs::create_dir_all(&dir)?;
    imputer.save_to_file(dir.join("imputer.json"))?;
    scaler.save_to_file(dir.join("scaler.json"))?;
    encoder.save_to_file(dir.join("encoder.json"))?;
    println!("\nUnits saved to: {:?}", dir);

    // 5. Load them back, as a serving process would
    let mut imputer = TransformUnit::load_from_file(dir.join("imputer.json"), &registry)?;
    let mut scaler = TransformUnit::load_from_file(dir.join("scaler.json"), &registry)?;
    let mut encoder = TransformUnit::load_from_file(dir.join("encoder.json"), &registry)?;

    // 6. Transform new houses; the recorded columns are reused, no spec needed
    let mut new = DataFrame::from_csv_reader(NEW_CSV.as_bytes(), b',')?.named("new");
    let none = Params::new();
    for unit in [&mut imputer, &mut scaler, &mut encoder] {
        unit.run(&mut new, &none)?;
    }
    println!();
    print_frame("Preprocessed new houses (unknown neighborhood -> null):", &new);

    // 7. A trained unit refuses to be trained again; the frame stays usable
    if let Err(e) = scaler.train(&mut new, &none) {
        println!("\nRetraining the scaler: {} (still {} rows in hand)", e, new.n_rows());
    }

    std::fs::remove_dir_all(&dir).ok();

    println!("\n=== Preprocessing Complete ===");
    Ok(())
}
