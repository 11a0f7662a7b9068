//! Initial values of the parameters of the layers.
use arrayfire::*;

use crate::tensor::*;

#[derive(Debug, Copy, Clone)]
pub enum Initializer {
    Constant(PrimitiveType),
    /// Uniform in `[-limit, limit]` with `limit = sqrt(6 / (fan_in + fan_out))`.
    GlorotUniform,
    Ones,
    Zeros,
}

impl Initializer {
    /// Creates a tensor of the given dimensions filled according to the initializer.
    pub(crate) fn new_tensor(self, dims: Dim, fan_in: u64, fan_out: u64) -> Tensor {
        match self {
            Initializer::Constant(value) => constant(value, dims),
            Initializer::GlorotUniform => {
                let limit = (6. / (fan_in + fan_out).max(1) as PrimitiveType).sqrt();
                Tensor::scaled_uniform(-limit, limit, dims)
            },
            Initializer::Ones => Tensor::ones(dims),
            Initializer::Zeros => Tensor::zeros(dims),
        }
    }
}

#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::initializers::Initializer;
    use crate::tensor::*;

    #[test]
    fn test_constant() {
        let tensor = Initializer::Constant(0.25).new_tensor(Dim4::new(&[3, 3, 2, 4]), 18, 4);
        assert_eq!(tensor.dims(), Dim4::new(&[3, 3, 2, 4]));
        assert!(tensor.to_vec().iter().all(|&value| (value - 0.25).abs() < 1e-7));
    }

    #[test]
    fn test_glorot_uniform_within_limit() {
        let limit = (6. / 43 as PrimitiveType).sqrt();
        let tensor = Initializer::GlorotUniform.new_tensor(Dim4::new(&[3, 3, 3, 16]), 27, 16);
        assert!(tensor.to_vec().iter().all(|value| value.abs() <= limit));
    }
}
