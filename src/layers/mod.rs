//! Collection of layers used to create neural networks.
use arrayfire::*;

use crate::errors::Error;
use crate::tensor::*;

// Public re-exports
pub use self::augmentation::RandomAugmentation;
pub use self::conv2d::Conv2D;
pub use self::conv2d::Padding;
pub use self::dense::Dense;
pub use self::dropout::Dropout;
pub use self::flatten::Flatten;
pub use self::max_pooling::MaxPool2D;
pub use self::rescaling::Rescaling;

mod augmentation;
mod conv2d;
mod dense;
mod dropout;
mod flatten;
mod max_pooling;
mod rescaling;


/// Public trait defining the behaviors of a layer.
pub trait Layer: std::fmt::Display {
    /// Returns the name of the layer.
    fn name(&self) -> &str;

    /// Initializes the parameters of the layer.
    fn initialize_parameters(&mut self, input_shape: Dim4);

    /// Computes the activation of the layer during the forward pass.
    fn compute_activation(&self, input: &Tensor) -> Tensor;

    /// Computes the forward pass and stores intermediate values for efficient backpropagation.
    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor;

    /// Computes the backward pass through the layer.
    ///
    /// The returned tensor is the derivative of the loss with respect to the input of the layer.
    fn compute_dactivation_mut(&mut self, input: &Tensor) -> Tensor;

    /// Returns the shape of the output.
    fn output_shape(&self) -> Dim;

    /// Returns the trainable parameters of the layer.
    fn parameters(&self) -> Option<Vec<&Tensor>> { None }

    /// Returns the trainable parameters of the layer and their derivatives.
    fn parameters_mut(&mut self) -> Option<(Vec<&mut Tensor>, Vec<&Tensor>)> { None }

    /// Switches the layer between training and inference behavior.
    ///
    /// In inference mode, stochastic layers are the identity and the backward pass skips the
    /// derivatives of the parameters.
    fn set_training(&mut self, _training: bool) {}

    /// Returns true if the layer accepts inputs whose height and width differ from the shape it was
    /// initialized with.
    fn is_resizable(&self) -> bool { true }

    /// Returns the height and width of the output for an input of the given height and width, or
    /// `None` if the input is too small for the layer.
    fn spatial_output_size(&self, size: (u64, u64)) -> Option<(u64, u64)> { Some(size) }

    /// Writes the parameters of the layer in the HDF5 group.
    ///
    /// # Arguments
    ///
    /// * `group`: The HDF5 group where the layer will be saved.
    /// * `layer_number`: The position of the layer in the network.
    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error>;
}


/// Creates a layer from the HDF5 group written by `Layer::save`.
pub(crate) fn load_layer(group: &hdf5::Group, layer_type: &str) -> Result<Box<dyn Layer>, Error> {
    let layer: Box<dyn Layer> = match layer_type {
        Conv2D::NAME => Conv2D::from_hdf5_group(group)?,
        Dense::NAME => Dense::from_hdf5_group(group)?,
        Dropout::NAME => Dropout::from_hdf5_group(group)?,
        Flatten::NAME => Flatten::from_hdf5_group(group)?,
        MaxPool2D::NAME => MaxPool2D::from_hdf5_group(group)?,
        RandomAugmentation::NAME => RandomAugmentation::from_hdf5_group(group)?,
        Rescaling::NAME => Rescaling::from_hdf5_group(group)?,
        _ => return Err(Error::UnknownLayer(layer_type.to_string())),
    };
    Ok(layer)
}

pub(crate) fn layer_group_name(layer_number: usize, layer_type: &str) -> String {
    layer_number.to_string() + &String::from("_") + layer_type
}

pub(crate) fn write_shape(group: &hdf5::Group, name: &str, shape: Dim) -> Result<(), Error> {
    let dataset = group.new_dataset::<[u64; 4]>().create(name, 1)?;
    dataset.write(&[*shape.get()])?;
    Ok(())
}

pub(crate) fn read_shape(group: &hdf5::Group, name: &str) -> Result<Dim, Error> {
    let shape = crate::io::read_scalar::<[u64; 4]>(group, name)?;
    Ok(Dim::new(&shape))
}

pub(crate) fn write_pair(group: &hdf5::Group, name: &str, pair: (u64, u64)) -> Result<(), Error> {
    let dataset = group.new_dataset::<[u64; 2]>().create(name, 1)?;
    dataset.write(&[[pair.0, pair.1]])?;
    Ok(())
}

pub(crate) fn read_pair(group: &hdf5::Group, name: &str) -> Result<(u64, u64), Error> {
    let pair = crate::io::read_scalar::<[u64; 2]>(group, name)?;
    Ok((pair[0], pair[1]))
}
