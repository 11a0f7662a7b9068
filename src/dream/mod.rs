//! DeepDream style image synthesis.
//!
//! The image is amplified by gradient ascent on the activations of intermediate layers of a
//! network, at a sequence of increasing resolutions (octaves). After each octave the detail lost by
//! the downscaling is put back in the image.
use arrayfire::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

pub use self::ascent::{gradient_ascent_loop, gradient_ascent_step};
pub use self::extractor::{FeatureExtractor, LayerWeights, Objective};
pub use self::octaves::{loop_octaves, octave_shapes, restore_detail};
pub use self::selection::{LayerPalette, LayerSequence};

pub mod ascent;
pub mod extractor;
pub mod octaves;
pub mod selection;

use crate::errors::Error;
use crate::imaging::*;
use crate::imaging::{load_image, save_image};
use crate::models::Network;
use crate::params::DreamParams;
use crate::signal;
use crate::tensor::*;

/// Crop applied to the activations when all layers are targeted at once.
pub const COMBINED_BORDER: u64 = 2;

/// Condition on the loss that ends the gradient ascent of an octave.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StopCriterion {
    /// The loss is greater than or equal to the threshold.
    AtLeast(PrimitiveType),
    /// The loss is strictly greater than the threshold.
    Above(PrimitiveType),
}

impl StopCriterion {
    pub fn is_met(&self, loss: PrimitiveType) -> bool {
        match *self {
            StopCriterion::AtLeast(threshold) => loss >= threshold,
            StopCriterion::Above(threshold) => loss > threshold,
        }
    }
}

/// How the layers of a run are targeted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Targeting {
    /// One pass per layer, each pass starting from the output of the previous one.
    Sequential,
    /// A single pass maximizing the weighted sum of all the layers.
    Combined,
}

impl Targeting {
    fn border(self) -> u64 {
        match self {
            Targeting::Sequential => 0,
            Targeting::Combined => COMBINED_BORDER,
        }
    }
}

/// Configuration of the octave loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DreamConfig {
    pub distortion_rate: PrimitiveType,
    pub octaves: usize,
    pub octave_scale: f64,
    /// Gradient ascent steps per octave.
    pub iterations: usize,
    pub stop: Option<StopCriterion>,
    pub targeting: Targeting,
    pub verbose: bool,
}

impl Default for DreamConfig {
    fn default() -> DreamConfig {
        DreamConfig {
            distortion_rate: 20.,
            octaves: 8,
            octave_scale: 1.3,
            iterations: 5,
            stop: None,
            targeting: Targeting::Combined,
            verbose: false,
        }
    }
}


/// Runs the octave loop over a network.
///
/// The network is switched to inference mode for the whole life of the runner.
pub struct DeepDream<'a> {
    network: &'a mut Network,
    config: DreamConfig,
}

impl<'a> DeepDream<'a> {
    pub fn new(network: &'a mut Network, config: DreamConfig) -> DeepDream<'a> {
        network.set_training(false);
        DeepDream { network, config }
    }

    pub fn config(&self) -> &DreamConfig {
        &self.config
    }

    /// Runs the octave loop on a preprocessed image.
    ///
    /// The octave scale must be finite and at least 1, and the smallest octave must still produce an
    /// activation at every targeted layer.
    pub fn dream_octaves(&mut self, image: &Tensor, weights: &LayerWeights) -> Result<Tensor, Error> {
        let scale = self.config.octave_scale;
        if !scale.is_finite() || scale < 1. {
            return Err(Error::InvalidOctaveScale(scale));
        }

        let extractor = FeatureExtractor::new(self.network, weights, self.config.targeting.border())?;
        let shapes = octave_shapes((image.height(), image.width()), self.config.octaves, scale);
        extractor.check_input_size(self.network, shapes[0])?;
        let num_octaves = shapes.len();

        let network = &mut *self.network;
        let config = &self.config;
        loop_octaves(image, &shapes, |i, octave_image| {
            let progress_bar = if config.verbose {
                let progress_bar = ProgressBar::new(config.iterations as u64);
                progress_bar.set_style(ProgressStyle::default_bar()
                    .template("   octave {prefix} [{bar:30}] {pos}/{len} {msg}")
                    .progress_chars("##-"));
                progress_bar.set_prefix(&format!("{}/{} {:?}", i + 1, num_octaves, (octave_image.height(), octave_image.width())));
                Some(progress_bar)
            } else {
                None
            };

            let (output, _) = gradient_ascent_loop(network, &extractor, &octave_image, config.iterations, config.distortion_rate, config.stop, progress_bar.as_ref())?;
            if let Some(progress_bar) = progress_bar { progress_bar.finish(); }
            Ok(output)
        })
    }

    /// Runs the octave loop on a raw image, once per layer or once for all layers.
    ///
    /// Between the passes of a sequential run the image is quantized to 8 bits, as if it had been
    /// saved and loaded again.
    pub fn dream(&mut self, image: &Tensor, weights: &LayerWeights) -> Result<Tensor, Error> {
        match self.config.targeting {
            Targeting::Combined => self.pass(image, weights),
            Targeting::Sequential => {
                if weights.is_empty() {
                    return Err(Error::EmptyLayerSequence);
                }
                let mut current = image.copy();
                for (i, (name, coefficient)) in weights.iter().enumerate() {
                    if self.config.verbose {
                        println!("Layer {} - Name: {}; Activation: {}", i + 1, name, coefficient);
                    }
                    current = floor(&self.pass(&current, &LayerWeights::single(name, *coefficient))?);
                }
                Ok(current)
            }
        }
    }

    /// Preprocesses the raw image, runs the octave loop and returns the raw result.
    fn pass(&mut self, image: &Tensor, weights: &LayerWeights) -> Result<Tensor, Error> {
        let output = self.dream_octaves(&preprocess(image), weights)?;
        Ok(deprocess(&output))
    }
}


/// Runs a dream described by a parameter file.
///
/// The image is fetched, dreamed and saved to the output path. In a sequential run the output is
/// saved after every layer and loaded again as the input of the next layer. The completion file is
/// created at the end.
///
/// # Return value
///
/// The path of the output image.
pub fn run(network: &mut Network, params: &DreamParams) -> Result<PathBuf, Error> {
    signal::clear(&params.done_path)?;

    if params.verbose {
        println!("Running DeepDream:");
        println!("   Input source: {}", params.image_origin);
        println!("   Output path: {}", params.output_path.display());
        println!("   Layers to iterate: {}\n", params.layers.len());
    }

    let image_path = params.image_source().fetch(params.verbose)?;
    let mut image = load_image(&image_path, None)?;
    let mut dreamer = DeepDream::new(network, params.dream_config());

    match params.targeting {
        Targeting::Combined => {
            let output = dreamer.dream(&image, &params.layers)?;
            save_image(&output, &params.output_path)?;
        },
        Targeting::Sequential => {
            if params.layers.is_empty() {
                return Err(Error::EmptyLayerSequence);
            }
            let last = params.layers.len() - 1;
            for (i, (name, coefficient)) in params.layers.iter().enumerate() {
                if params.verbose {
                    println!("Layer {} - Name: {}; Activation: {}", i + 1, name, coefficient);
                }
                let output = dreamer.pass(&image, &LayerWeights::single(name, *coefficient))?;
                save_image(&output, &params.output_path)?;
                if i != last {
                    image = load_image(&params.output_path, None)?;
                }
            }
        },
    }

    signal::signal_completion(&params.done_path)?;
    if params.verbose {
        println!("Output image successfully saved to: {}", params.output_path.display());
    }
    Ok(params.output_path.clone())
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::dream::*;
    use crate::errors::Error;
    use crate::imaging::{load_image, save_image};
    use crate::layers::*;
    use crate::losses::BinaryCrossEntropy;
    use crate::models::Network;
    use crate::optimizers::SGD;
    use crate::params::{DreamParams, ImageOriginFormat};
    use crate::tensor::*;
    use crate::training::{build_classifier, OptimizerKind};

    fn network() -> Network {
        let mut network = Network::new(Dim4::new(&[32, 32, 3, 1]), BinaryCrossEntropy, SGD::new(0.1)).unwrap();
        network.add_named("conv_a", Conv2D::new(4, (3, 3), (1, 1), Padding::Same)).unwrap();
        network.add_named("pool", MaxPool2D::new((2, 2))).unwrap();
        network.add_named("conv_b", Conv2D::new(4, (3, 3), (1, 1), Padding::Same)).unwrap();
        network
    }

    fn params(dir: &std::path::Path, targeting: Targeting, iterations: usize) -> DreamParams {
        DreamParams {
            verbose: false,
            image_name: "seed.png".to_string(),
            image_origin: dir.join("seed.png").display().to_string(),
            image_origin_format: ImageOriginFormat::Path,
            output_path: dir.join("output").join("dream.png"),
            done_path: dir.join("output").join("DONE"),
            distortion_rate: 20.,
            octaves: 3,
            octave_scale: 1.4,
            iterations,
            max_loss: None,
            layers: vec![("conv_a".to_string(), 6.), ("conv_b".to_string(), 15.)].into_iter().collect(),
            targeting,
        }
    }

    #[test]
    fn test_default_config() {
        let config = DreamConfig::default();
        assert_eq!((config.octaves, config.iterations, config.targeting), (8, 5, Targeting::Combined));
        assert_approx_eq!([config.distortion_rate], [20.]);
        assert_eq!(config.stop, None);
    }

    #[test]
    fn test_stop_criterion() {
        assert!(StopCriterion::AtLeast(2.).is_met(2.));
        assert!(!StopCriterion::Above(2.).is_met(2.));
        assert!(StopCriterion::Above(2.).is_met(2.5));
        assert!(!StopCriterion::AtLeast(2.).is_met(1.5));
    }

    #[test]
    fn test_zero_iterations_returns_original() {
        let mut network = network();
        let config = DreamConfig { iterations: 0, octaves: 3, octave_scale: 1.4, ..DreamConfig::default() };
        let mut dreamer = DeepDream::new(&mut network, config);

        let image = Tensor::scaled_uniform(-1., 1., Dim4::new(&[299, 299, 3, 1]));
        let output = dreamer.dream_octaves(&image, &LayerWeights::single("conv_a", 1.)).unwrap();
        assert_approx_eq!(output.to_vec(), image.to_vec(), 1e-4);
    }

    #[test]
    fn test_invalid_octave_scale() {
        let image = Tensor::scaled_uniform(-1., 1., Dim4::new(&[16, 16, 3, 1]));
        for &scale in [0., 0.5, std::f64::NAN, std::f64::INFINITY].iter() {
            let mut network = network();
            let config = DreamConfig { octave_scale: scale, iterations: 1, ..DreamConfig::default() };
            let mut dreamer = DeepDream::new(&mut network, config);
            match dreamer.dream_octaves(&image, &LayerWeights::single("conv_a", 1.)) {
                Err(Error::InvalidOctaveScale(value)) => assert!(value.is_nan() || value == scale),
                _ => panic!("expected an invalid octave scale error for {}", scale),
            }
        }
    }

    #[test]
    fn test_smallest_octave_too_small_for_layer() {
        // 299 / 1.3^7 leaves 47 pixels, pooled down to 1 before the last 3x3 convolution
        let mut network = build_classifier((180, 180), OptimizerKind::RMSProp, 0.001).unwrap();
        let mut dreamer = DeepDream::new(&mut network, DreamConfig::default());
        let image = Tensor::zeros(Dim4::new(&[299, 299, 3, 1]));

        match dreamer.dream(&image, &LayerWeights::single("conv2d_4", 15.)) {
            Err(Error::OctaveTooSmall { layer, shape }) => {
                assert_eq!(layer, "conv2d_4");
                assert_eq!(shape, (47, 47));
            },
            _ => panic!("expected an octave too small error"),
        }
    }

    #[test]
    fn test_dream_changes_image() {
        let mut network = network();
        let config = DreamConfig { iterations: 2, octaves: 2, ..DreamConfig::default() };
        let mut dreamer = DeepDream::new(&mut network, config);

        let image = Tensor::scaled_uniform(0., 255., Dim4::new(&[24, 20, 3, 1]));
        let weights = LayerWeights::single("conv_b", 1.);
        let output = dreamer.dream(&image, &weights).unwrap();
        assert_eq!(output.dims(), image.dims());
        let (output, image) = (output.to_vec(), image.to_vec());
        assert!(output.iter().all(|value| *value >= 0. && *value <= 255.));
        assert!(output.iter().zip(image.iter()).any(|(a, b)| (a - b).abs() > 1e-3));
    }

    #[test]
    fn test_sequential_dream_is_quantized() {
        let mut network = network();
        let config = DreamConfig { iterations: 1, octaves: 2, targeting: Targeting::Sequential, ..DreamConfig::default() };
        let mut dreamer = DeepDream::new(&mut network, config);

        let image = Tensor::scaled_uniform(0., 255., Dim4::new(&[16, 16, 3, 1]));
        let weights: LayerWeights = vec![("conv_a".to_string(), 6.), ("conv_b".to_string(), 15.)].into_iter().collect();
        let output = dreamer.dream(&image, &weights).unwrap().to_vec();
        assert!(output.iter().all(|value| value.fract() == 0.));
    }

    #[test]
    fn test_run_from_params() {
        let dir = tempfile::tempdir().unwrap();
        let seed = Tensor::scaled_uniform(0., 255., Dim4::new(&[20, 24, 3, 1]));
        save_image(&seed, &dir.path().join("seed.png")).unwrap();

        for targeting in [Targeting::Sequential, Targeting::Combined].iter() {
            let mut network = network();
            let params = params(dir.path(), *targeting, 1);
            let output = run(&mut network, &params).unwrap();
            assert_eq!(output, dir.path().join("output").join("dream.png"));
            assert_eq!(load_image(&output, None).unwrap().dims(), Dim4::new(&[20, 24, 3, 1]));
            assert!(params.done_path.exists());
        }
    }

    #[test]
    fn test_run_with_unknown_layer() {
        let dir = tempfile::tempdir().unwrap();
        let seed = Tensor::scaled_uniform(0., 255., Dim4::new(&[8, 8, 3, 1]));
        save_image(&seed, &dir.path().join("seed.png")).unwrap();

        let mut network = network();
        let mut params = params(dir.path(), Targeting::Combined, 1);
        params.layers = LayerWeights::single("mixed3", 1.);
        assert!(run(&mut network, &params).is_err());
        assert!(!params.done_path.exists());
        assert!(!params.output_path.exists());
    }
}
