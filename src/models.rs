//! Base module to create neural networks.
use arrayfire::*;
use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use std::fmt;
use std::path::Path;

use crate::callbacks::{Checkpoint, EpochRecord, History};
use crate::data::{BatchIterator, DataSet};
use crate::errors::Error;
use crate::io::*;
use crate::layers::*;
use crate::losses::*;
use crate::metrics::*;
use crate::optimizers::*;
use crate::tensor::*;


/// Structure representing a neural network.
///
/// Layers are stored in order and addressed by a unique name.
pub struct Network
{
    layers: Vec<Box<dyn Layer>>,
    layer_names: Vec<String>,
    loss_function: Box<dyn Loss>,
    optimizer: Box<dyn Optimizer>,
    input_shape: Dim,
    output_shape: Dim,
    classes: Option<Vec<String>>,
}

impl Network
{
    /// Creates an empty neural network.
    ///
    /// The input shape must be in the form [height, width, channel, 1]. Mini-batches are created along the fourth dimension.
    pub fn new<L, O>(input_shape: Dim,
                     loss_function: L,
                     optimizer: O,
    ) -> Result<Network, Error>
        where L: Loss + 'static,
              O: Optimizer + 'static
    {
        let dims = input_shape.get();
        if dims[0] == 0 || dims[1] == 0 || dims[2] == 0 || dims[3] != 1 {
            return Err(Error::InvalidInputShape);
        }

        // Generate a random seed used by ArrayFire
        let mut rng = thread_rng();
        set_seed(rng.gen());

        Ok(Network {
            layers: Vec::new(),
            layer_names: Vec::new(),
            loss_function: Box::new(loss_function),
            optimizer: Box::new(optimizer),
            input_shape,
            output_shape: input_shape,
            classes: None,
        })
    }

    /// Adds a layer to the network.
    ///
    /// The layer is named after its type, with a numeric suffix if the name is already taken
    /// (`conv2d`, `conv2d_1`, ...).
    pub fn add(&mut self, layer: Box<dyn Layer>) {
        let base = layer.name().to_lowercase();
        let mut name = base.clone();
        let mut count = 0;
        while self.layer_index(&name).is_some() {
            count += 1;
            name = format!("{}_{}", base, count);
        }
        self.push_layer(name, layer);
    }

    /// Adds a layer with a given name to the network.
    pub fn add_named(&mut self, name: &str, layer: Box<dyn Layer>) -> Result<(), Error> {
        if self.layer_index(name).is_some() {
            return Err(Error::DuplicateLayerName(name.to_string()));
        }
        self.push_layer(name.to_string(), layer);
        Ok(())
    }

    fn push_layer(&mut self, name: String, mut layer: Box<dyn Layer>) {
        layer.initialize_parameters(self.output_shape);
        self.output_shape = layer.output_shape();
        self.layers.push(layer);
        self.layer_names.push(name);
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    /// Returns the position of the layer with the given name.
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.iter().position(|layer_name| layer_name == name)
    }

    pub(crate) fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_shape(&self) -> Dim {
        self.input_shape
    }

    pub fn output_shape(&self) -> Dim {
        self.output_shape
    }

    pub fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    /// Switches every layer between training and inference behavior.
    pub fn set_training(&mut self, training: bool) {
        for layer in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }


    /// Computes the output of the network for a given input.
    fn forward(&self, input: &Tensor) -> Tensor {
        self.layers.iter().fold(
            input.copy(),
            |a_prev, layer| layer.compute_activation(&a_prev)
        )
    }

    /// Computes a forward pass of the network.
    ///
    /// The intermediate values computed during the forward pass are stored in each layer for efficient back propagation.
    fn forward_mut(&mut self, input: &Tensor) -> Tensor {
        self.layers.iter_mut().fold(
            input.copy(),
            |a_prev, layer| layer.compute_activation_mut(&a_prev)
        )
    }

    /// Computes a backward pass of the network.
    ///
    /// # Arguments
    ///
    /// * `y_pred` - The output of the network.
    /// * `y_true` - The true labels.
    fn backward(&mut self,
                y_pred: &Tensor,
                y_true: &Tensor
    ) {
        self.layers.iter_mut().rev().fold(
            self.loss_function.grad(y_pred, y_true),
            |da_prev, layer| layer.compute_dactivation_mut(&da_prev)
        );
    }

    /// Computes the derivative of a loss defined on intermediate activations with respect to the input.
    ///
    /// The input is propagated through the first `depth` layers. After each layer, `seed` receives the
    /// index of the layer and its activation and may return the contribution of the layer to the loss
    /// together with the derivative of that contribution with respect to the activation. Layers use
    /// their current training or inference behavior.
    ///
    /// # Return value
    ///
    /// Tuple containing the loss and its derivative with respect to the input.
    pub fn input_gradient<F>(&mut self,
                             input: &Tensor,
                             depth: usize,
                             mut seed: F
    ) -> Result<(PrimitiveType, Tensor), Error>
        where F: FnMut(usize, &Tensor) -> Option<(PrimitiveType, Tensor)>
    {
        if self.layers.is_empty() {
            return Err(Error::NoLayer);
        }
        let depth = depth.min(self.layers.len());

        let mut loss = 0.;
        let mut seeds: Vec<Option<Tensor>> = Vec::with_capacity(depth);
        let mut activation = input.copy();
        for (idx, layer) in self.layers.iter_mut().take(depth).enumerate() {
            activation = layer.compute_activation_mut(&activation);
            match seed(idx, &activation) {
                Some((value, grad)) => {
                    loss += value;
                    seeds.push(Some(grad));
                },
                None => seeds.push(None),
            }
        }

        // Derivative with respect to the output of the current layer, None while it is zero
        let mut grad: Option<Tensor> = None;
        for (layer, seed_grad) in self.layers.iter_mut().take(depth).zip(seeds.into_iter()).rev() {
            grad = match (grad, seed_grad) {
                (Some(grad), Some(seed_grad)) => Some(add(&grad, &seed_grad, false)),
                (grad, seed_grad) => grad.or(seed_grad),
            };
            if let Some(ref da) = grad {
                grad = Some(layer.compute_dactivation_mut(da));
            }
        }

        let grad = grad.unwrap_or_else(|| Tensor::zeros(input.dims()));
        Ok((loss, grad))
    }

    /// Fits the neural network with the training data.
    ///
    /// The training data are shuffled at the beginning of each epoch, before batches are created. The training loss and
    /// metrics are averaged over the mini-batches of the epoch. The validation loss and metrics are computed in inference
    /// mode at the end of each epoch if the data set contains validation samples.
    ///
    /// # Arguments
    ///
    /// * `data` - The data set.
    /// * `batch_size` - The size of the mini-batches.
    /// * `epochs` - The number of passes over the training samples.
    /// * `metrics` - The metrics evaluated alongside the loss.
    /// * `checkpoint` - If given, saves the network each time the validation loss improves.
    pub fn fit<T: DataSet>(&mut self,
                           data: &T,
                           batch_size: u64,
                           epochs: u64,
                           metrics: &[Metrics],
                           mut checkpoint: Option<&mut Checkpoint>,
    ) -> Result<History, Error> {
        if self.layers.is_empty() {
            return Err(Error::NoLayer);
        }
        let expected = self.input_shape.get();
        let found = data.input_shape();
        if expected[0..3] != found.get()[0..3] {
            return Err(Error::InvalidInputShape);
        }

        let device = get_device();
        let (name, platform, _, _) = device_info();
        println!("Running on {} using {}.", name, platform);

        self.initialize_optimizer();

        // If it's a classification problem, store the classes.
        self.classes = data.classes();

        let mut history = History::new(metrics.iter().map(|metric| metric.name().to_string()).collect());
        let num_batches = (data.num_train_samples() as f64 / batch_size.max(1) as f64).ceil() as u64;
        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50}] {msg}")
            .progress_chars("##-");

        for epoch in 1..=epochs {
            self.set_training(true);
            let progress_bar = ProgressBar::new(num_batches);
            progress_bar.set_style(sty.clone());
            progress_bar.set_message(&format!("epoch: {}/{}", epoch, epochs));

            let (x_train_shuffled, y_train_shuffled) = Tensor::shuffle(data.x_train(), data.y_train());
            let batches = BatchIterator::new((&x_train_shuffled, &y_train_shuffled), batch_size);
            let mut train_loss = 0.;
            let mut train_metrics: Vec<PrimitiveType> = vec![0.; metrics.len()];
            let mut count = 0;

            // Iterate over the batches
            for (mini_batch_x, mini_batch_y) in batches {

                // Compute a pass on the network
                let y_pred = self.forward_mut(&mini_batch_x);
                train_loss += self.loss_function.eval(&y_pred, &mini_batch_y);
                for (value, metric) in train_metrics.iter_mut().zip(metrics) {
                    *value += metric.eval(&y_pred, &mini_batch_y);
                }
                self.backward(&y_pred, &mini_batch_y);

                // Update the parameters of the model
                self.update_parameters();

                sync(device);
                count += 1;
                progress_bar.inc(1);
            }
            let count = count.max(1) as PrimitiveType;
            train_loss /= count;
            train_metrics.iter_mut().for_each(|value| *value /= count);

            // Compute the loss and metrics evaluated on the validation set
            self.set_training(false);
            let (valid_loss, valid_metrics) = match (data.x_valid(), data.y_valid()) {
                (Some(x_valid), Some(y_valid)) if x_valid.batch_size() > 0 => {
                    let (loss, values) = self.evaluate(x_valid, y_valid, batch_size, metrics);
                    (Some(loss), values)
                },
                _ => (None, Vec::new()),
            };

            let record = EpochRecord { epoch, train_loss, train_metrics, valid_loss, valid_metrics };
            let saved = match checkpoint.as_mut() {
                Some(checkpoint) => checkpoint.update(self, &record)?,
                None => false,
            };
            progress_bar.finish_with_message(&format!("{}{}", Self::format_record(&record, epochs, metrics), if saved { ", saved" } else { "" }));
            history.push(record);
        }
        self.set_training(false);
        Ok(history)
    }

    fn format_record(record: &EpochRecord, epochs: u64, metrics: &[Metrics]) -> String {
        let mut message = format!("epoch: {}/{}, train_loss: {:.5}", record.epoch, epochs, record.train_loss);
        for (metric, value) in metrics.iter().zip(&record.train_metrics) {
            message.push_str(&format!(", train_{}: {:.4}", metric.name(), value));
        }
        if let Some(valid_loss) = record.valid_loss {
            message.push_str(&format!(", valid_loss: {:.5}", valid_loss));
            for (metric, value) in metrics.iter().zip(&record.valid_metrics) {
                message.push_str(&format!(", valid_{}: {:.4}", metric.name(), value));
            }
        }
        message
    }


    /// Initializes the parameters of the optimizer.
    fn initialize_optimizer(&mut self) {
        let mut dims = Vec::<(Dim, Dim)>::new();
        for layer in self.layers.iter() {
            match layer.parameters() {
                Some(param) => dims.push((param[0].dims(), param[1].dims())),
                None => dims.push((Dim::new(&[1, 1, 1, 1]), Dim::new(&[1, 1, 1, 1])))
            }
        }
        self.optimizer.initialize_parameters(dims);
    }


    /// Computes the loss and the predicted output.
    ///
    /// # Return value
    ///
    /// Tuple containing the loss averaged over the mini-batches and the predicted output.
    fn compute_loss(&self,
                    x: &Tensor,
                    y: &Tensor,
                    batch_size: u64,
    ) -> (PrimitiveType, Tensor) {
        let mut loss = 0.;
        let mut y_pred = Tensor::new_empty_tensor();

        let batches = BatchIterator::new((x, y), batch_size);
        let num_batches = batches.num_batches().max(1) as PrimitiveType;

        for (count, (mini_batch_x, mini_batch_y)) in batches.enumerate() {
            let y_pred_batch = self.forward(&mini_batch_x);
            loss += self.loss_function.eval(&y_pred_batch, &mini_batch_y);

            if count == 0 {
                y_pred = y_pred_batch;
            } else {
                y_pred = join(3, &y_pred, &y_pred_batch);
            }
        }
        (loss / num_batches, y_pred)
    }


    /// Evaluates the model on a set of samples.
    ///
    /// # Return value
    ///
    /// Tuple containing the loss and the values of the metrics.
    pub fn evaluate(&self,
                    x: &Tensor,
                    y: &Tensor,
                    batch_size: u64,
                    metrics: &[Metrics]
    ) -> (PrimitiveType, Vec<PrimitiveType>) {
        let (loss, y_pred) = self.compute_loss(x, y, batch_size);
        let metrics_values = self.compute_metrics(&y_pred, y, batch_size, metrics);
        (loss, metrics_values)
    }


    /// Evaluates the metrics.
    ///
    /// # Arguments
    ///
    /// * `y_pred` - The labels predicted by the model.
    /// * `y_true` - The true labels.
    /// * `batch_size` - y_pred and y_true are split in chunks of batch_size to reduce the memory footprint
    ///
    /// # Return value
    ///
    /// Vector containing the values for each metric.
    fn compute_metrics(&self,
                       y_pred: &Tensor,
                       y_true: &Tensor,
                       batch_size: u64,
                       metrics: &[Metrics],
    ) -> Vec<PrimitiveType> {
        let mut metrics_values: Vec<PrimitiveType> = vec![0.; metrics.len()];
        if metrics.is_empty() {
            return metrics_values;
        }

        let batches = BatchIterator::new((y_pred, y_true), batch_size);
        let num_batches = batches.num_batches().max(1) as PrimitiveType;
        for (y_pred_batch, y_true_batch) in batches {
            for (i, metric) in metrics.iter().enumerate() {
                metrics_values[i] += metric.eval(&y_pred_batch, &y_true_batch);
            }
        }

        // Divide by number of batches
        for metric in metrics_values.iter_mut() {
            *metric /= num_batches;
        }
        metrics_values
    }


    /// Updates the parameters of the model.
    fn update_parameters(&mut self) {
        self.optimizer.update_time_step();
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            self.optimizer.update_parameters(&mut **layer, idx);
        }
    }


    /// Computes the output of the network for the given input.
    ///
    /// Multiple samples can be evaluated at once by stacking them along the fourth dimension of the tensor.
    pub fn predict(&self, input: &Tensor) -> Tensor {
        self.forward(input)
    }

    /// Predicts the class for the input.
    ///
    /// Multiple samples can be evaluated at once by stacking them along the fourth dimension of the tensor.
    ///
    /// # Return value
    ///
    /// Vector of tuples containing the predicted class and the probability for each sample.
    pub fn predict_class(&self, input: &Tensor) -> Result<Vec<(String, PrimitiveType)>, Error> {
        let classes = self.classes.as_ref().ok_or(Error::NoClasses)?;
        let batch_size = input.batch_size() as usize;
        let mut predictions: Vec<(String, PrimitiveType)> = Vec::with_capacity(batch_size);

        // Compute the output of the network and retrieve value and index of maximum value
        let y_pred = self.predict(input);
        let (probabilities_tensor, class_idxs_tensor) = imax(&y_pred, 0);

        // Retrieve values from the device
        let mut probabilities: Vec<PrimitiveType> = vec![0 as PrimitiveType; batch_size];
        let mut class_idxs: Vec<u32> = vec![0; batch_size];
        probabilities_tensor.host(&mut probabilities);
        class_idxs_tensor.host(&mut class_idxs);

        for i in 0..batch_size {
            // Single output networks encode the second class as 1
            let (idx, probability) = if y_pred.dims()[0] == 1 {
                if probabilities[i] >= 0.5 { (1, probabilities[i]) } else { (0, 1. - probabilities[i]) }
            } else {
                (class_idxs[i] as usize, probabilities[i])
            };
            let class = classes.get(idx).cloned().unwrap_or_else(|| idx.to_string());
            predictions.push((class, probability));
        }
        Ok(predictions)
    }


    /// Saves the model in HDF5 format.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let file = hdf5::File::create(path)?;

        let version: &'static str = env!("CARGO_PKG_VERSION");
        write_strings(&file, "gap_version", &[version.to_string()])?;

        write_scalar(&file, "loss", self.loss_function.id())?;
        self.optimizer.save(&file)?;

        write_shape(&file, "input_shape", self.input_shape)?;
        write_shape(&file, "output_shape", self.output_shape)?;

        if let Some(classes) = &self.classes {
            write_strings(&file, "classes", classes)?;
        }
        write_strings(&file, "layer_names", &self.layer_names)?;

        let layers_group = create_group(&file, "layers")?;
        for (i, layer) in self.layers.iter().enumerate() {
            layer.save(&layers_group, i)?;
        }
        Ok(())
    }

    /// Loads a model from a HDF5 file.
    pub fn load(path: &Path) -> Result<Network, Error> {
        let _ = hdf5::silence_errors();
        let file = hdf5::File::open(path)?;

        // Shapes
        let input_shape = read_shape(&file, "input_shape")?;
        let output_shape = read_shape(&file, "output_shape")?;

        // Layers
        let mut layers: Vec<Box<dyn Layer>> = Vec::new();
        let layers_group = file.group("layers")?;
        for group_name in list_subgroups(&layers_group) {
            let group = layers_group.group(&group_name)?;
            let layer_type = group_name.splitn(2, '_').nth(1).unwrap_or_default();
            layers.push(load_layer(&group, layer_type)?);
        }

        let layer_names = if file.link_exists("layer_names") {
            read_strings(&file, "layer_names")?
        } else {
            layers.iter().enumerate().map(|(i, layer)| format!("{}_{}", layer.name().to_lowercase(), i)).collect()
        };
        if layer_names.len() != layers.len() {
            return Err(Error::HDF5Error(hdf5::Error::from("The number of layer names doesn't match the number of layers.")));
        }

        let optimizer = optimizer_from_hdf5_group(&file.group("optimizer")?)?;
        let loss_function = loss_from_id(read_scalar::<u64>(&file, "loss")?)?;

        let classes = if file.link_exists("classes") {
            Some(read_strings(&file, "classes")?)
        } else {
            None
        };

        Ok(Network {
            layers,
            layer_names,
            loss_function,
            optimizer,
            input_shape,
            output_shape,
            classes,
        })
    }
}


impl fmt::Display for Network
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "=====")?;
        writeln!(f, "Model")?;
        writeln!(f, "=====")?;
        writeln!(f, "Input shape: [{}, {}, {}]", self.input_shape[0], self.input_shape[1], self.input_shape[2])?;
        writeln!(f, "Output shape: [{}, {}, {}]", self.output_shape[0], self.output_shape[1], self.output_shape[2])?;
        writeln!(f, "Optimizer: {}", self.optimizer.name())?;
        if let Some(classes) = &self.classes { writeln!(f, "Classes: {}", classes.join(", "))?; }
        writeln!(f, "\nName \t\t\t Layer \t\t Parameters \t Output shape")?;
        writeln!(f, "-------------------------------------------------------------")?;
        for (name, layer) in self.layer_names.iter().zip(self.layers.iter()) {
            writeln!(f, "{:<24} {}", name, layer)?;
        }
        Ok(())
    }
}
