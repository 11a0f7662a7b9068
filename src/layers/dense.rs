//! Fully connected layer
use arrayfire::*;
use std::fmt;

use crate::activations::*;
use crate::errors::Error;
use crate::initializers::Initializer;
use crate::layers::*;
use crate::tensor::*;


/// Defines a fully connected layer.
pub struct Dense
{
    units: u64,
    activation: Activation,
    weights: Tensor,
    dweights: Tensor,
    biases: Tensor,
    dbiases: Tensor,
    input_shape: Dim4,
    linear_activation: Option<Tensor>,
    previous_input: Option<Tensor>,
    weights_initializer: Initializer,
    biases_initializer: Initializer,
    training: bool,
}


impl Dense
{
    pub(crate) const NAME: &'static str = "Dense";

    /// Creates a dense layer with Glorot uniform weights and zero biases.
    pub fn new(units: u64, activation: Activation) -> Box<Dense> {
        Dense::with_param(units, activation, Initializer::GlorotUniform, Initializer::Zeros)
    }

    pub fn with_param(units: u64, activation: Activation, weights_initializer: Initializer, biases_initializer: Initializer) -> Box<Dense> {
        Box::new(Dense {
            units,
            activation,
            weights: Tensor::new_empty_tensor(),
            dweights: Tensor::new_empty_tensor(),
            biases: Tensor::new_empty_tensor(),
            dbiases: Tensor::new_empty_tensor(),
            input_shape: Dim4::new(&[0, 0, 0, 0]),
            linear_activation: None,
            previous_input: None,
            weights_initializer,
            biases_initializer,
            training: true,
        })
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Dense>, Error> {
        let activation = Activation::from_id(crate::io::read_scalar::<u64>(group, "activation")?)?;
        let weights = crate::io::read_tensor(group, "weights")?;
        let biases = crate::io::read_tensor(group, "biases")?;

        Ok(Box::new(Dense {
            units: weights.dims()[0],
            activation,
            dweights: Tensor::zeros(weights.dims()),
            dbiases: Tensor::zeros(biases.dims()),
            weights,
            biases,
            input_shape: read_shape(group, "input_shape")?,
            linear_activation: None,
            previous_input: None,
            weights_initializer: Initializer::GlorotUniform,
            biases_initializer: Initializer::Zeros,
            training: true,
        }))
    }

    /// Reshapes a batch of inputs into a matrix with one sample per column.
    fn flatten_input(&self, input: &Tensor) -> Tensor {
        moddims(input, Dim4::new(&[self.weights.dims()[1], input.batch_size(), 1, 1]))
    }

    fn linear_activation(&self, flat_input: &Tensor) -> Tensor {
        add(&matmul(&self.weights, flat_input, MatProp::NONE, MatProp::NONE), &self.biases, true)
    }

    /// Converts the [units, batch] matrix into the [units, 1, 1, batch] layout of the network.
    fn to_batch_layout(&self, matrix: &Tensor) -> Tensor {
        moddims(matrix, Dim4::new(&[self.units, 1, 1, matrix.dims()[1]]))
    }
}

impl Layer for Dense
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim4) {
        let fan_in = input_shape[0] * input_shape[1] * input_shape[2];
        let fan_out = self.units;
        self.weights = self.weights_initializer.new_tensor(Dim4::new(&[fan_out, fan_in, 1, 1]), fan_in, fan_out);
        self.biases = self.biases_initializer.new_tensor(Dim4::new(&[fan_out, 1, 1, 1]), fan_in, fan_out);
        self.dweights = Tensor::zeros(self.weights.dims());
        self.dbiases = Tensor::zeros(self.biases.dims());
        self.input_shape = input_shape;
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        let flat_input = self.flatten_input(input);
        self.to_batch_layout(&self.activation.eval(&self.linear_activation(&flat_input)))
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        let flat_input = self.flatten_input(input);
        let linear_activation = self.linear_activation(&flat_input);
        let nonlinear_activation = self.activation.eval(&linear_activation);

        // Save input and linear activation for efficient backprop
        self.previous_input = Some(flat_input);
        self.linear_activation = Some(linear_activation);

        self.to_batch_layout(&nonlinear_activation)
    }

    fn compute_dactivation_mut(&mut self, da: &Tensor) -> Tensor {
        let batch_size = da.batch_size();
        match (&self.linear_activation, &self.previous_input) {
            (Some(linear_activation), Some(previous_input)) => {
                let da = moddims(da, Dim4::new(&[self.units, batch_size, 1, 1]));
                let dz = mul(&da, &self.activation.grad(linear_activation), false);
                if self.training {
                    self.dweights = matmul(&dz, previous_input, MatProp::NONE, MatProp::TRANS);
                    self.dbiases = sum(&dz, 1);
                }
                let dinput = matmul(&self.weights, &dz, MatProp::TRANS, MatProp::NONE);
                dinput.reshape(Dim4::new(&[self.input_shape[0], self.input_shape[1], self.input_shape[2], batch_size]))
            },
            _ => panic!("The linear activations z have not been computed!"),
        }
    }

    fn output_shape(&self) -> Dim4 {
        Dim4::new(&[self.units, 1, 1, 1])
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

    fn is_resizable(&self) -> bool {
        false
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let dense = group.create_group(&layer_group_name(layer_number, Self::NAME))?;

        crate::io::write_scalar(&dense, "activation", self.activation.id())?;
        write_shape(&dense, "input_shape", self.input_shape)?;
        crate::io::save_vec_tensor(&dense, &[self.weights.copy()], "weights")?;
        crate::io::save_vec_tensor(&dense, &[self.biases.copy()], "biases")?;

        Ok(())
    }
}

impl fmt::Display for Dense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let num_parameters = self.weights.elements() + self.biases.elements();
        write!(f, "{} \t\t {} \t\t [{}, {}, {}]", Self::NAME, num_parameters, self.units, 1, 1)
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::activations::Activation;
    use crate::assert_approx_eq;
    use crate::initializers::Initializer;
    use crate::layers::{Dense, Layer};
    use crate::tensor::*;

    fn create_test_layer() -> Box<Dense> {
        let mut layer = Dense::with_param(2, Activation::Linear, Initializer::Ones, Initializer::Constant(0.5));
        layer.initialize_parameters(Dim4::new(&[3, 1, 1, 1]));
        layer
    }

    #[test]
    fn test_dense_forward() {
        let mut layer = create_test_layer();
        let input = Tensor::new(&[1., 2., 3., -1., 0., 4.], Dim4::new(&[3, 1, 1, 2]));
        let output = layer.compute_activation_mut(&input);
        assert_eq!(output.dims(), Dim4::new(&[2, 1, 1, 2]));
        assert_approx_eq!(output.to_vec(), [6.5, 6.5, 3.5, 3.5]);
    }

    #[test]
    fn test_dense_backward() {
        let mut layer = create_test_layer();
        let input = Tensor::new(&[1., 2., 3., -1., 0., 4.], Dim4::new(&[3, 1, 1, 2]));
        let _ = layer.compute_activation_mut(&input);

        let da = Tensor::new(&[1., 0., 0., 2.], Dim4::new(&[2, 1, 1, 2]));
        let dinput = layer.compute_dactivation_mut(&da);
        assert_eq!(dinput.dims(), input.dims());
        assert_approx_eq!(dinput.to_vec(), [1., 1., 1., 2., 2., 2.]);

        let (_, dparameters) = layer.parameters_mut().unwrap();
        // Row 0 sees the first sample, row 1 twice the second one
        assert_approx_eq!(dparameters[0].to_vec(), [1., -2., 2., 0., 3., 8.]);
        assert_approx_eq!(dparameters[1].to_vec(), [1., 2.]);
    }
}
