//! Dropout layer
use arrayfire::*;
use rand::prelude::*;
use std::fmt;

use crate::errors::Error;
use crate::layers::*;
use crate::tensor::*;


/// Defines a dropout layer.
///
/// Units are dropped during training only. In inference mode the layer is the identity.
pub struct Dropout {
    drop_rate: PrimitiveType,
    output_shape: Dim4,
    mask: Option<Tensor>,
    random_engine: RandomEngine,
    scaling_factor: PrimitiveType,
    training: bool,
}

impl Dropout {
    pub(crate) const NAME: &'static str = "Dropout";

    /// Creates a dropout layer.
    ///
    /// # Arguments
    /// * `rate`: probability that a unit will be dropped. Must be between 0 and 1.
    ///
    /// # Panics
    /// The method panics if `rate` is smaller than 0 or greater or equal to 1.
    ///
    pub fn new(rate: PrimitiveType) -> Box<Dropout> {

        if rate < 0. || rate >= 1. {
            panic!("The drop rate is invalid.");
        }

        let mut rng = rand::thread_rng();
        let seed: u64 = rng.gen();
        let random_engine = RandomEngine::new(RandomEngineType::PHILOX_4X32_10, Some(seed));

        Box::new(Dropout {
            drop_rate: rate,
            output_shape: Dim4::new(&[0, 0, 0, 0]),
            mask: None,
            random_engine,
            scaling_factor: 1. / (1. - rate),
            training: true,
        })
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Dropout>, Error> {
        let mut layer = Dropout::new(crate::io::read_scalar::<PrimitiveType>(group, "drop_rate")?);
        layer.output_shape = read_shape(group, "output_shape")?;
        Ok(layer)
    }

    /// Generates a binomial mask to let some values pass through the layer.
    fn generate_binomial_mask(&self, dims: Dim4) -> Tensor {
        let random_values = random_uniform::<PrimitiveType>(dims, &self.random_engine);
        let cond = gt(&random_values, &self.drop_rate, true);
        cond.cast()
    }
}

impl Layer for Dropout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim4) {
        self.output_shape = input_shape;
    }

    fn compute_activation(&self, prev_activation: &Tensor) -> Tensor {
        prev_activation.copy()
    }

    fn compute_activation_mut(&mut self, prev_activation: &Tensor) -> Tensor {
        if !self.training {
            self.mask = None;
            return prev_activation.copy();
        }

        // Inverted dropout
        let mask = mul(&self.generate_binomial_mask(prev_activation.dims()), &self.scaling_factor, false);
        let output = mul(prev_activation, &mask, false);
        self.mask = Some(mask);
        output
    }

    fn compute_dactivation_mut(&mut self, dz: &Tensor) -> Tensor {
        match &self.mask {
            Some(mask) => mul(dz, mask, false),
            None => dz.copy(),
        }
    }

    fn output_shape(&self) -> Dim4 {
        self.output_shape
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let dropout = group.create_group(&layer_group_name(layer_number, Self::NAME))?;
        crate::io::write_scalar(&dropout, "drop_rate", self.drop_rate)?;
        write_shape(&dropout, "output_shape", self.output_shape)?;
        Ok(())
    }
}

impl fmt::Display for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \t\t 0 \t\t [{}, {}, {}]", Self::NAME, self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::layers::{Dropout, Layer};
    use crate::tensor::*;

    #[test]
    fn test_dropout_is_identity_in_inference() {
        let mut layer = Dropout::new(0.5);
        layer.initialize_parameters(Dim4::new(&[10, 1, 1, 1]));
        layer.set_training(false);
        let input = Tensor::scaled_uniform(-1., 1., Dim4::new(&[10, 1, 1, 4]));
        let output = layer.compute_activation_mut(&input);
        assert_approx_eq!(output.to_vec(), input.to_vec());

        let dinput = layer.compute_dactivation_mut(&input);
        assert_approx_eq!(dinput.to_vec(), input.to_vec());
    }

    #[test]
    fn test_dropout_scales_kept_units() {
        let mut layer = Dropout::new(0.5);
        layer.initialize_parameters(Dim4::new(&[100, 1, 1, 1]));
        let output = layer.compute_activation_mut(&Tensor::ones(Dim4::new(&[100, 1, 1, 1])));
        assert!(output.to_vec().iter().all(|&value| value.abs() < 1e-6 || (value - 2.).abs() < 1e-6));
    }
}
