//! Training pipeline of the binary image classifier.
use arrayfire::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::activations::Activation;
use crate::callbacks::{Checkpoint, History};
use crate::data::{DataSet, DataSetError, ImageDataSet};
use crate::data::image_data::TEST_SUBSET;
use crate::errors::Error;
use crate::imaging::load_image;
use crate::layers::*;
use crate::losses::BinaryCrossEntropy;
use crate::metrics::Metrics;
use crate::models::Network;
use crate::optimizers::{Adam, RMSProp, SGD};
use crate::signal;
use crate::tensor::*;

/// Height and width of the images the classifier is trained on.
pub const IMAGE_SIZE: u32 = 180;

/// Optimizers the classifier can be trained with.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum OptimizerKind {
    SGD,
    Adam,
    RMSProp,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<OptimizerKind, Error> {
        match s.to_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::SGD),
            "adam" => Ok(OptimizerKind::Adam),
            "rmsprop" => Ok(OptimizerKind::RMSProp),
            _ => Err(Error::UnknownOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptimizerKind::SGD => write!(f, "SGD"),
            OptimizerKind::Adam => write!(f, "Adam"),
            OptimizerKind::RMSProp => write!(f, "RMSProp"),
        }
    }
}


/// Settings of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Directory containing the `train`, `validation` and `test` subsets.
    pub data_dir: PathBuf,
    /// Where the best model is saved.
    pub model_path: PathBuf,
    /// CSV file receiving one row per epoch.
    pub history_path: Option<PathBuf>,
    /// (width, height) of the input images.
    pub image_size: (u32, u32),
    pub batch_size: u64,
    pub epochs: u64,
    pub optimizer: OptimizerKind,
    pub learning_rate: PrimitiveType,
    pub done_path: Option<PathBuf>,
    pub verbose: bool,
}

impl TrainingConfig {
    /// Creates a configuration with 180x180 images, batches of 32, 3 epochs and RMSProp.
    pub fn new(data_dir: &Path, model_path: &Path) -> TrainingConfig {
        TrainingConfig {
            data_dir: data_dir.to_path_buf(),
            model_path: model_path.to_path_buf(),
            history_path: None,
            image_size: (IMAGE_SIZE, IMAGE_SIZE),
            batch_size: 32,
            epochs: 3,
            optimizer: OptimizerKind::RMSProp,
            learning_rate: 0.001,
            done_path: None,
            verbose: true,
        }
    }
}


/// Outcome of a training run.
#[derive(Debug)]
pub struct TrainingReport {
    pub history: History,
    /// Loss and accuracy on the test subset, when there is one.
    pub test: Option<(PrimitiveType, PrimitiveType)>,
}


fn empty_network(input_shape: Dim, optimizer: OptimizerKind, learning_rate: PrimitiveType) -> Result<Network, Error> {
    match optimizer {
        OptimizerKind::SGD => Network::new(input_shape, BinaryCrossEntropy, SGD::new(learning_rate)),
        OptimizerKind::Adam => Network::new(input_shape, BinaryCrossEntropy, Adam::new(learning_rate)),
        OptimizerKind::RMSProp => Network::new(input_shape, BinaryCrossEntropy, RMSProp::new(learning_rate)),
    }
}

/// Creates the classifier: augmentation, rescaling, five convolutions separated by max pooling and
/// a single sigmoid output.
///
/// The images must be at least 78 pixels high and wide for the last convolution to have an output.
pub fn build_classifier((width, height): (u32, u32), optimizer: OptimizerKind, learning_rate: PrimitiveType) -> Result<Network, Error> {
    let mut network = empty_network(Dim::new(&[height as u64, width as u64, 3, 1]), optimizer, learning_rate)?;

    network.add(RandomAugmentation::new(true, 0.1, 0.2));
    network.add(Rescaling::new(1. / 255., 0.));
    for (i, &filters) in [32, 64, 128, 256, 256].iter().enumerate() {
        if i > 0 {
            network.add(MaxPool2D::new((2, 2)));
        }
        network.add(Conv2D::new(filters, (3, 3), (1, 1), Padding::Valid));
    }
    network.add(Flatten::new());
    network.add(Dropout::new(0.5));
    network.add(Dense::new(1, Activation::Sigmoid));
    Ok(network)
}


/// Trains a classifier on an image data set.
///
/// The model is saved every time the validation loss improves. Without a validation subset, the
/// model of the last epoch is saved. The model is then evaluated on the test subset if present and
/// the completion file is created.
pub fn train(config: &TrainingConfig) -> Result<TrainingReport, Error> {
    if let Some(done_path) = &config.done_path {
        signal::clear(done_path)?;
    }

    if config.verbose {
        println!("Starting training cycle:");
        println!("   Epochs: {}", config.epochs);
        println!("   Batch size: {}", config.batch_size);
        println!("   Optimizer: {} (learning rate {})\n", config.optimizer, config.learning_rate);
    }

    let data = ImageDataSet::from_path(&config.data_dir, config.image_size)?;
    if config.verbose {
        println!("{}", data);
    }

    let mut network = build_classifier(config.image_size, config.optimizer, config.learning_rate)?;
    if config.verbose {
        println!("{}", network);
    }

    let metrics = [Metrics::Accuracy];
    let mut checkpoint = Checkpoint::new(&config.model_path);
    let history = network.fit(&data, config.batch_size, config.epochs, &metrics, Some(&mut checkpoint))?;
    if checkpoint.best().is_none() {
        network.save(&config.model_path)?;
    }

    if let Some(history_path) = &config.history_path {
        history.save_csv(history_path)?;
    }

    let test = match (data.x_test(), data.y_test()) {
        (Some(x_test), Some(y_test)) => {
            let (loss, values) = network.evaluate(x_test, y_test, config.batch_size, &metrics);
            Some((loss, values[0]))
        },
        _ => None,
    };
    if config.verbose {
        println!("\nTraining finished:");
        if let Some((loss, accuracy)) = test {
            println!("   Testing loss: {:.3}", loss);
            println!("   Testing accuracy: {:.3}", accuracy);
        }
        println!("   Model saved to: {}", config.model_path.display());
    }

    if let Some(done_path) = &config.done_path {
        signal::signal_completion(done_path)?;
    }
    Ok(TrainingReport { history, test })
}


/// Evaluates a saved model on the test subset of a data set.
///
/// # Return value
///
/// Tuple containing the loss and the accuracy.
pub fn evaluate_model(model_path: &Path, data_dir: &Path, batch_size: u64) -> Result<(PrimitiveType, PrimitiveType), Error> {
    let network = Network::load(model_path)?;
    let dims = *network.input_shape().get();
    let data = ImageDataSet::from_path(data_dir, (dims[1] as u32, dims[0] as u32))?;

    match (data.x_test(), data.y_test()) {
        (Some(x_test), Some(y_test)) => {
            let (loss, values) = network.evaluate(x_test, y_test, batch_size, &[Metrics::Accuracy]);
            Ok((loss, values[0]))
        },
        _ => Err(Error::from(DataSetError::SubsetDoesNotExist(data_dir.join(TEST_SUBSET)))),
    }
}

/// Classifies an image file with a trained model. The image is resized to the input of the model.
pub fn classify_image(network: &Network, path: &Path) -> Result<(String, PrimitiveType), Error> {
    let dims = *network.input_shape().get();
    let image = load_image(path, Some((dims[1] as u32, dims[0] as u32)))?;
    let mut predictions = network.predict_class(&image)?;
    predictions.pop().ok_or(Error::NoClasses)
}
