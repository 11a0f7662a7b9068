//! Full ladybug pipeline: split the numbered samples, train the classifier and visualize what
//! it learned.
use std::path::{Path, PathBuf};

use gap::data::subsets::{create_subsets, default_subsets, DEFAULT_CLASSES, DEFAULT_EXTENSION};
use gap::errors::Error;
use gap::models::Network;
use gap::training::{train, TrainingConfig};
use gap::visualize::{self, VisualizeConfig};

fn main() -> Result<(), Error> {
    let source = Path::new("datasets/ladybug");
    let data_dir = Path::new("datasets/ladybug_subsets");
    let model_path = Path::new("models/ladybug.h5");

    if !data_dir.exists() {
        create_subsets(source, data_dir, &DEFAULT_CLASSES, DEFAULT_EXTENSION, &default_subsets(), true)?;
    }

    let mut config = TrainingConfig::new(data_dir, model_path);
    config.history_path = Some(PathBuf::from("models/ladybug_history.csv"));
    let report = train(&config)?;
    if let Some(best) = report.history.best_valid_loss() {
        println!("Best validation loss: {:.4}", best);
    }

    let mut network = Network::load(model_path)?;
    let mut config = VisualizeConfig::new(PathBuf::from("output/ladybug.png"));
    config.done_path = Some(PathBuf::from("output/DONE"));
    visualize::run(&mut network, &config)?;

    Ok(())
}
