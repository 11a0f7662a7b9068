//! Writes a parameter file for a sequential run over a custom layer sequence, runs it and waits
//! for the completion file like the scheduling process does.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gap::dream::{self, LayerPalette, Targeting};
use gap::errors::Error;
use gap::models::Network;
use gap::params::{DreamParams, ImageOriginFormat, ParamsLayout};
use gap::signal;

fn main() -> Result<(), Error> {
    let mut network = Network::load(Path::new("models/ladybug.h5"))?;
    let sequence = LayerPalette::from_network(&network).custom(&["conv2d_1", "conv2d_2", "conv2d_3"])?;

    let params = DreamParams {
        verbose: true,
        image_name: "ladybug.jpg".to_string(),
        image_origin: "https://upload.wikimedia.org/wikipedia/commons/d/d6/Coccinella_magnifica01.jpg".to_string(),
        image_origin_format: ImageOriginFormat::Url,
        output_path: PathBuf::from("output/sequence.png"),
        done_path: PathBuf::from("output/DONE"),
        distortion_rate: 20.,
        octaves: 6,
        octave_scale: 1.3,
        iterations: 5,
        max_loss: Some(15.),
        layers: sequence.to_weights(),
        targeting: Targeting::Sequential,
    };
    let params_path = Path::new("output/params.txt");
    fs::create_dir_all("output")?;
    params.save(params_path, ParamsLayout::Full)?;

    let params = DreamParams::load(params_path, ParamsLayout::Full)?;
    dream::run(&mut network, &params)?;

    signal::wait_for_completion(&params.done_path, Duration::from_millis(500))?;
    println!("Dream finished: {}", params.output_path.display());
    Ok(())
}
