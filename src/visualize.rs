//! Visualization of what a classifier responds to, by moving random noise along the gradient of
//! its output.
use arrayfire::*;
use std::path::PathBuf;

use crate::dream::{gradient_ascent_step, Objective};
use crate::errors::Error;
use crate::imaging::{deprocess, random_noise, save_image};
use crate::models::Network;
use crate::signal;
use crate::tensor::*;

/// Direction in which the image is moved.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Direction {
    /// Increases the output of the model.
    Ascent,
    /// Decreases the output of the model.
    Descent,
}

impl Direction {
    fn sign(self) -> PrimitiveType {
        match self {
            Direction::Ascent => 1.,
            Direction::Descent => -1.,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualizeConfig {
    pub iterations: usize,
    pub distortion_rate: PrimitiveType,
    pub direction: Direction,
    pub output_path: PathBuf,
    pub done_path: Option<PathBuf>,
    pub verbose: bool,
}

impl VisualizeConfig {
    /// Creates a configuration of 100 descent steps with a rate of 15.
    pub fn new(output_path: PathBuf) -> VisualizeConfig {
        VisualizeConfig {
            iterations: 100,
            distortion_rate: 15.,
            direction: Direction::Descent,
            output_path,
            done_path: None,
            verbose: true,
        }
    }
}


/// Mean of the output of the whole network.
#[derive(Debug, Copy, Clone, Default)]
pub struct ClassScore;

impl Objective for ClassScore {
    fn loss_and_gradient(&self, network: &mut Network, input: &Tensor) -> Result<(PrimitiveType, Tensor), Error> {
        let last = network.num_layers().saturating_sub(1);
        network.input_gradient(input, network.num_layers(), |idx, output| {
            if idx != last {
                return None;
            }
            let num_elements = output.elements() as PrimitiveType;
            let score = mean_all(output).0 as PrimitiveType;
            Some((score, constant(1. / num_elements, output.dims())))
        })
    }
}


/// Moves uniform noise, shaped like the input of the network, along the gradient of its output.
///
/// # Return value
///
/// The image in raw pixel values.
pub fn visualize_class(network: &mut Network, config: &VisualizeConfig) -> Result<Tensor, Error> {
    network.set_training(false);
    let dims = network.input_shape();
    let mut image = random_noise(dims[0], dims[1]);
    let rate = config.direction.sign() * config.distortion_rate;

    for i in 0..config.iterations {
        let (score, next) = gradient_ascent_step(network, &ClassScore, &image, rate)?;
        image = next;
        if config.verbose {
            println!("Iteration {}/{} - Activation: {:.5}", i + 1, config.iterations, score);
        }
    }
    Ok(deprocess(&image))
}

/// Visualizes a classifier, saves the image and creates the completion file.
pub fn run(network: &mut Network, config: &VisualizeConfig) -> Result<PathBuf, Error> {
    if let Some(done_path) = &config.done_path {
        signal::clear(done_path)?;
    }
    if config.verbose {
        println!("Running class visualization:");
        println!("   Output path: {}", config.output_path.display());
        println!("   Total iterations: {}", config.iterations);
        println!("   Distortion rate: {}\n", config.distortion_rate);
    }

    let image = visualize_class(network, config)?;
    save_image(&image, &config.output_path)?;

    if config.verbose {
        println!("\nOutput saved to: {}", config.output_path.display());
    }
    if let Some(done_path) = &config.done_path {
        signal::signal_completion(done_path)?;
    }
    Ok(config.output_path.clone())
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::activations::Activation;
    use crate::assert_approx_eq;
    use crate::imaging::load_image;
    use crate::layers::*;
    use crate::losses::BinaryCrossEntropy;
    use crate::optimizers::SGD;
    use crate::visualize::*;

    fn classifier() -> Network {
        let mut network = Network::new(Dim4::new(&[12, 12, 3, 1]), BinaryCrossEntropy, SGD::new(0.1)).unwrap();
        network.add(Rescaling::new(1. / 255., 0.));
        network.add(Conv2D::new(4, (3, 3), (1, 1), Padding::Valid));
        network.add(MaxPool2D::new((2, 2)));
        network.add(Flatten::new());
        network.add(Dropout::new(0.5));
        network.add(Dense::new(1, Activation::Sigmoid));
        network
    }

    #[test]
    fn test_class_score_gradient() {
        let mut network = Network::new(Dim4::new(&[2, 1, 1, 1]), BinaryCrossEntropy, SGD::new(0.1)).unwrap();
        network.add(Rescaling::new(3., 1.));
        let input = Tensor::new(&[1., 2.], Dim4::new(&[2, 1, 1, 1]));

        // mean(3x + 1) over two values
        let (score, grad) = ClassScore.loss_and_gradient(&mut network, &input).unwrap();
        assert_approx_eq!([score], [5.5]);
        assert_approx_eq!(grad.to_vec(), [1.5, 1.5]);
    }

    #[test]
    fn test_direction_changes_score() {
        // Linear logit, so any step along the gradient moves the output the same way
        let mut network = Network::new(Dim4::new(&[4, 4, 3, 1]), BinaryCrossEntropy, SGD::new(0.1)).unwrap();
        network.add(Rescaling::new(1. / 255., 0.));
        network.add(Flatten::new());
        network.add(Dense::new(1, Activation::Sigmoid));
        network.set_training(false);

        let input = Tensor::scaled_uniform(0., 255., Dim4::new(&[4, 4, 3, 1]));
        let before = mean_all(&network.predict(&input)).0 as f32;
        for &direction in [Direction::Ascent, Direction::Descent].iter() {
            let (_, next) = gradient_ascent_step(&mut network, &ClassScore, &input, direction.sign() * 20.).unwrap();
            let after = mean_all(&network.predict(&next)).0 as f32;
            match direction {
                Direction::Ascent => assert!(after > before),
                Direction::Descent => assert!(after < before),
            }
        }
    }

    #[test]
    fn test_run_saves_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VisualizeConfig::new(dir.path().join("output").join("output.png"));
        config.iterations = 3;
        config.done_path = Some(dir.path().join("DONE"));
        config.verbose = false;

        let mut network = classifier();
        let output = run(&mut network, &config).unwrap();
        assert_eq!(load_image(&output, None).unwrap().dims(), Dim4::new(&[12, 12, 3, 1]));
        assert!(dir.path().join("DONE").exists());
    }
}
