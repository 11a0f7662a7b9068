//! Dreams on a local image with layers drawn at random from a trained classifier.
use rand::thread_rng;
use std::path::Path;

use gap::dream::{DeepDream, DreamConfig, LayerPalette, Targeting};
use gap::errors::Error;
use gap::imaging::{load_image, save_image};
use gap::models::Network;

fn main() -> Result<(), Error> {
    // Model trained with `cargo run --example ladybug`
    let mut network = Network::load(Path::new("models/ladybug.h5"))?;
    let image = load_image(Path::new("images/seed.jpg"), None)?;

    // The last convolution needs octaves of at least 78 pixels
    let palette = LayerPalette::from_network(&network)
        .with_preferences(&["conv2d_2"], &["conv2d_3", "maxpool2d_3"], &["randomaugmentation", "rescaling", "conv2d_4"]);
    let sequence = palette.filtered_random(3, &mut thread_rng())?;
    println!("Layers: {:?}", sequence.names());

    let config = DreamConfig {
        targeting: Targeting::Combined,
        verbose: true,
        ..DreamConfig::default()
    };
    let mut dreamer = DeepDream::new(&mut network, config);
    let output = dreamer.dream(&image, &sequence.to_weights())?;
    save_image(&output, Path::new("output/deep_dream.png"))?;

    Ok(())
}
