//! 2D convolution layer
use arrayfire::*;
use std::fmt;

use crate::activations::Activation;
use crate::errors::Error;
use crate::initializers::Initializer;
use crate::layers::*;
use crate::tensor::*;

/// Padding applied to the input of a convolution.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Padding {
    /// The input is zero padded so that the output keeps the height and width of the input (stride 1).
    Same,
    /// No padding, the kernel only visits full windows.
    Valid,
}

impl Padding {
    fn id(&self) -> u64 {
        match self {
            Padding::Same => 0,
            Padding::Valid => 1,
        }
    }

    fn from_id(id: u64) -> Padding {
        if id == 0 { Padding::Same } else { Padding::Valid }
    }
}


/// Defines a 2D convolution layer.
///
/// The convolution is computed as a matrix product between the unrolled windows of the input
/// and the flattened kernels, so inputs of any height and width are accepted.
pub struct Conv2D {
    activation: Activation,
    kernel_size: (u64, u64),
    stride: (u64, u64),
    padding: Padding,
    num_filters: u64,
    input_shape: Dim,
    output_shape: Dim,
    weights: Tensor,
    biases: Tensor,
    dweights: Tensor,
    dbiases: Tensor,
    linear_activation: Option<Tensor>,
    previous_cols: Option<Tensor>,
    previous_input_shape: Dim,
    weights_initializer: Initializer,
    biases_initializer: Initializer,
    training: bool,
}

impl Conv2D {

    pub(crate) const NAME: &'static str = "Conv2D";

    /// Creates a 2D convolution layer with ReLU activation and Glorot uniform initialization.
    ///
    /// # Arguments
    ///
    /// * `num_filters` - The number of filters (output channels).
    /// * `kernel_size` - The height and width of the kernel.
    /// * `stride` - The vertical and horizontal stride.
    /// * `padding` - The padding applied to the input.
    pub fn new(num_filters: u64,
               kernel_size: (u64, u64),
               stride: (u64, u64),
               padding: Padding
    ) -> Box<Conv2D> {
        Conv2D::with_param(num_filters, kernel_size, stride, padding, Activation::ReLU, Initializer::GlorotUniform, Initializer::Zeros)
    }

    /// Creates a 2D convolution layer with the given activation and initializers.
    pub fn with_param(num_filters: u64,
                      kernel_size: (u64, u64),
                      stride: (u64, u64),
                      padding: Padding,
                      activation: Activation,
                      weights_initializer: Initializer,
                      biases_initializer: Initializer
    ) -> Box<Conv2D> {
        Box::new(Conv2D {
            activation,
            kernel_size,
            stride,
            padding,
            num_filters,
            input_shape: Dim::new(&[0, 0, 0, 0]),
            output_shape: Dim::new(&[0, 0, 0, 0]),
            weights: Tensor::new_empty_tensor(),
            biases: Tensor::new_empty_tensor(),
            dweights: Tensor::new_empty_tensor(),
            dbiases: Tensor::new_empty_tensor(),
            linear_activation: None,
            previous_cols: None,
            previous_input_shape: Dim::new(&[0, 0, 0, 0]),
            weights_initializer,
            biases_initializer,
            training: true,
        })
    }

    /// Creates a Conv2D layer from an HDF5 group.
    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Conv2D>, Error> {
        let activation = Activation::from_id(crate::io::read_scalar::<u64>(group, "activation")?)?;
        let padding = Padding::from_id(crate::io::read_scalar::<u64>(group, "padding")?);
        let weights = crate::io::read_tensor(group, "weights")?;
        let biases = crate::io::read_tensor(group, "biases")?;
        let num_filters = weights.dims()[3];

        Ok(Box::new(Conv2D {
            activation,
            kernel_size: read_pair(group, "kernel_size")?,
            stride: read_pair(group, "stride")?,
            padding,
            num_filters,
            input_shape: read_shape(group, "input_shape")?,
            output_shape: read_shape(group, "output_shape")?,
            dweights: Tensor::zeros(weights.dims()),
            dbiases: Tensor::zeros(biases.dims()),
            weights,
            biases,
            linear_activation: None,
            previous_cols: None,
            previous_input_shape: Dim::new(&[0, 0, 0, 0]),
            weights_initializer: Initializer::GlorotUniform,
            biases_initializer: Initializer::Zeros,
            training: true,
        }))
    }

    fn padding_size(&self) -> (u64, u64) {
        match self.padding {
            Padding::Same => ((self.kernel_size.0 - 1) / 2, (self.kernel_size.1 - 1) / 2),
            Padding::Valid => (0, 0),
        }
    }

    /// Computes the height and width of the output for an input of the given height and width.
    fn output_size(&self, height: u64, width: u64) -> (u64, u64) {
        let (pad_h, pad_w) = self.padding_size();
        let output_height = (height + 2 * pad_h).saturating_sub(self.kernel_size.0) / self.stride.0 + 1;
        let output_width = (width + 2 * pad_w).saturating_sub(self.kernel_size.1) / self.stride.1 + 1;
        (output_height, output_width)
    }

    fn num_inputs_per_filter(&self) -> u64 {
        self.kernel_size.0 * self.kernel_size.1 * self.input_shape[2]
    }

    /// Unrolls the windows of the input into a matrix of shape [windows * batch, kernel elements * channels].
    fn im2col(&self, input: &Tensor) -> Tensor {
        let (pad_h, pad_w) = self.padding_size();
        let cols = unwrap(input, self.kernel_size.0 as i64, self.kernel_size.1 as i64, self.stride.0 as i64, self.stride.1 as i64, pad_h as i64, pad_w as i64, true);

        // [kernel elements, windows, channels, batch] -> [windows, batch, kernel elements, channels]
        let num_windows = cols.dims()[1];
        let reordered = reorder_v2(&cols, 1, 3, Some(vec![0, 2]));
        moddims(&reordered, Dim::new(&[num_windows * input.batch_size(), self.num_inputs_per_filter(), 1, 1]))
    }

    fn flat_weights(&self) -> Tensor {
        moddims(&self.weights, Dim::new(&[self.num_inputs_per_filter(), self.num_filters, 1, 1]))
    }

    /// Computes the linear activation from the unrolled input.
    fn convolve(&self, cols: &Tensor, input_dims: Dim) -> Tensor {
        let (output_height, output_width) = self.output_size(input_dims[0], input_dims[1]);
        let batch_size = input_dims[3];
        let product = matmul(cols, &self.flat_weights(), MatProp::NONE, MatProp::NONE);

        // [windows * batch, filters] -> [height, width, filters, batch]
        let product = moddims(&product, Dim::new(&[output_height * output_width, batch_size, self.num_filters, 1]));
        let product = reorder_v2(&product, 0, 2, Some(vec![1, 3]));
        let product = moddims(&product, Dim::new(&[output_height, output_width, self.num_filters, batch_size]));
        add(&product, &self.biases, true)
    }
}

impl Layer for Conv2D {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim4) {
        let num_channels = input_shape[2];
        let fan_in = self.kernel_size.0 * self.kernel_size.1 * num_channels;
        let fan_out = self.kernel_size.0 * self.kernel_size.1 * self.num_filters;
        self.weights = self.weights_initializer.new_tensor(Dim::new(&[self.kernel_size.0, self.kernel_size.1, num_channels, self.num_filters]), fan_in, fan_out);
        self.biases = self.biases_initializer.new_tensor(Dim::new(&[1, 1, self.num_filters, 1]), fan_in, fan_out);
        self.dweights = Tensor::zeros(self.weights.dims());
        self.dbiases = Tensor::zeros(self.biases.dims());

        let (output_height, output_width) = self.output_size(input_shape[0], input_shape[1]);
        self.input_shape = input_shape;
        self.output_shape = Dim::new(&[output_height, output_width, self.num_filters, 1]);
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        let cols = self.im2col(input);
        self.activation.eval(&self.convolve(&cols, input.dims()))
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        let cols = self.im2col(input);
        let linear_activation = self.convolve(&cols, input.dims());
        let nonlinear_activation = self.activation.eval(&linear_activation);

        // Save the unrolled input and linear activation for efficient backprop
        self.previous_cols = Some(cols);
        self.previous_input_shape = input.dims();
        self.linear_activation = Some(linear_activation);

        nonlinear_activation
    }

    fn compute_dactivation_mut(&mut self, da: &Tensor) -> Tensor {
        let (linear_activation, cols) = match (&self.linear_activation, &self.previous_cols) {
            (Some(linear_activation), Some(cols)) => (linear_activation, cols),
            _ => panic!("The linear activations z have not been computed!"),
        };

        let dz = mul(da, &self.activation.grad(linear_activation), true);
        let output_height = dz.dims()[0];
        let output_width = dz.dims()[1];
        let batch_size = dz.batch_size();

        // [height, width, filters, batch] -> [windows * batch, filters]
        let dz_flat = moddims(&dz, Dim::new(&[output_height * output_width, self.num_filters, batch_size, 1]));
        let dz_flat = reorder_v2(&dz_flat, 0, 2, Some(vec![1, 3]));
        let dz_flat = moddims(&dz_flat, Dim::new(&[output_height * output_width * batch_size, self.num_filters, 1, 1]));

        if self.training {
            let dweights = matmul(cols, &dz_flat, MatProp::TRANS, MatProp::NONE);
            self.dweights = moddims(&dweights, self.weights.dims());
            self.dbiases = moddims(&sum(&dz_flat, 0), self.biases.dims());
        }

        // [windows * batch, kernel elements * channels] -> [kernel elements, windows, channels, batch]
        let dcols = matmul(&dz_flat, &self.flat_weights(), MatProp::NONE, MatProp::TRANS);
        let dcols = moddims(&dcols, Dim::new(&[output_height * output_width, batch_size, self.kernel_size.0 * self.kernel_size.1, self.input_shape[2]]));
        let dcols = reorder_v2(&dcols, 2, 0, Some(vec![3, 1]));

        let (pad_h, pad_w) = self.padding_size();
        wrap(&dcols, self.previous_input_shape[0] as i64, self.previous_input_shape[1] as i64, self.kernel_size.0 as i64, self.kernel_size.1 as i64, self.stride.0 as i64, self.stride.1 as i64, pad_h as i64, pad_w as i64, true)
    }

    fn output_shape(&self) -> Dim {
        self.output_shape
    }

    fn spatial_output_size(&self, (height, width): (u64, u64)) -> Option<(u64, u64)> {
        let (pad_h, pad_w) = self.padding_size();
        if height + 2 * pad_h < self.kernel_size.0 || width + 2 * pad_w < self.kernel_size.1 {
            return None;
        }
        Some(self.output_size(height, width))
    }

    fn parameters(&self) -> Option<Vec<&Tensor>> {
        Some(vec![&self.weights, &self.biases])
    }

    fn parameters_mut(&mut self) -> Option<(Vec<&mut Tensor>, Vec<&Tensor>)> {
        Some((vec![&mut self.weights, &mut self.biases], vec![&self.dweights, &self.dbiases]))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let conv2d = group.create_group(&layer_group_name(layer_number, Self::NAME))?;

        crate::io::write_scalar(&conv2d, "activation", self.activation.id())?;
        crate::io::write_scalar(&conv2d, "padding", self.padding.id())?;
        write_pair(&conv2d, "kernel_size", self.kernel_size)?;
        write_pair(&conv2d, "stride", self.stride)?;
        write_shape(&conv2d, "input_shape", self.input_shape)?;
        write_shape(&conv2d, "output_shape", self.output_shape)?;
        crate::io::save_vec_tensor(&conv2d, &[self.weights.copy()], "weights")?;
        crate::io::save_vec_tensor(&conv2d, &[self.biases.copy()], "biases")?;

        Ok(())
    }
}

impl fmt::Display for Conv2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num_parameters = self.weights.elements() + self.biases.elements();
        write!(f, "{} \t\t {} \t\t [{}, {}, {}]", Self::NAME, num_parameters, self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}
