//! Element-wise activation functions applied after the linear part of a layer.
use arrayfire::*;

use crate::errors::Error;
use crate::tensor::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Linear,
    ReLU,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Applies the activation to the linear activation `z`.
    pub fn eval(&self, z: &Tensor) -> Tensor {
        match self {
            Activation::Linear => z.copy(),
            Activation::ReLU => maxof(z, &constant(0 as PrimitiveType, z.dims()), false),
            Activation::Sigmoid => sigmoid(z),
            Activation::Tanh => tanh(z),
        }
    }

    /// Derivative of the activation with respect to `z`. ReLU has a derivative of one at zero.
    pub(crate) fn grad(&self, z: &Tensor) -> Tensor {
        match self {
            Activation::Linear => Tensor::ones(z.dims()),
            Activation::ReLU => ge(z, &(0 as PrimitiveType), false).cast::<PrimitiveType>(),
            Activation::Sigmoid => {
                let s = sigmoid(z);
                mul(&s, &sub(&(1 as PrimitiveType), &s, false), false)
            },
            Activation::Tanh => {
                let t = tanh(z);
                sub(&(1 as PrimitiveType), &mul(&t, &t, false), false)
            },
        }
    }

    /// Identifier written in model files.
    pub(crate) fn id(&self) -> u64 {
        match self {
            Activation::Sigmoid => 0,
            Activation::Tanh => 2,
            Activation::ReLU => 3,
            Activation::Linear => 5,
        }
    }

    pub(crate) fn from_id(id: u64) -> Result<Activation, Error> {
        match id {
            0 => Ok(Activation::Sigmoid),
            2 => Ok(Activation::Tanh),
            3 => Ok(Activation::ReLU),
            5 => Ok(Activation::Linear),
            _ => Err(Error::UnknownActivation(id)),
        }
    }
}
