//! Loss functions.
use arrayfire::*;

use crate::errors::Error;
use crate::tensor::*;

/// Values of the predictions are clipped to [EPSILON, 1 - EPSILON] before taking logarithms.
const EPSILON: PrimitiveType = 1e-7;

/// Defines the behaviors of a loss function.
pub trait Loss {
    /// Returns a unique identifier.
    fn id(&self) -> u64;

    /// Computes the value of the loss function.
    ///
    /// # Arguments
    /// * `y_pred`: predicted labels
    /// * `y_true`: true labels
    ///
    fn eval(&self, y_pred: &Tensor, y_true: &Tensor) -> PrimitiveType;

    /// Computes the gradient of the loss function.
    ///
    /// # Arguments
    /// * `y_pred`: predicted labels
    /// * `y_true`: true labels
    ///
    fn grad(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor;
}

/// Creates the loss function with the given identifier.
pub(crate) fn loss_from_id(id: u64) -> Result<Box<dyn Loss>, Error> {
    match id {
        1 => Ok(Box::new(BinaryCrossEntropy)),
        _ => Err(Error::UnknownLoss(id)),
    }
}

/// Defines the binary cross entropy loss.
///
/// The loss is averaged over the samples of the batch.
#[derive(Debug, Copy, Clone)]
pub struct BinaryCrossEntropy;

impl Loss for BinaryCrossEntropy {
    fn id(&self) -> u64 {
        1
    }

    fn eval(&self,
            y_pred: &Tensor,
            y_true: &Tensor
    ) -> PrimitiveType {
        let batch_size = y_pred.batch_size() as PrimitiveType;
        let clipped = clamp(y_pred, &EPSILON, &(1. - EPSILON), false);
        let ones = Tensor::ones(y_true.dims());
        let loss = mul(y_true, &log(&clipped), false) + mul(&(&ones - y_true), &log(&(&ones - &clipped)), false);
        -1. / batch_size * sum_all(&loss).0 as PrimitiveType
    }

    fn grad(&self,
            y_pred: &Tensor,
            y_true: &Tensor
    ) -> Tensor {
        let batch_size = y_pred.batch_size() as PrimitiveType;
        let clipped = clamp(y_pred, &EPSILON, &(1. - EPSILON), false);
        let ones = Tensor::ones(y_true.dims());
        let grad = div(y_true, &clipped, false) - div(&(&ones - y_true), &(&ones - &clipped), false);
        mul(&grad, &(-1. / batch_size), false)
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::losses::{BinaryCrossEntropy, Loss, loss_from_id};
    use crate::tensor::*;

    #[test]
    fn test_binary_cross_entropy_eval() {
        let y_pred = Tensor::new(&[0.9, 0.2], Dim4::new(&[1, 1, 1, 2]));
        let y_true = Tensor::new(&[1., 0.], Dim4::new(&[1, 1, 1, 2]));
        let loss = BinaryCrossEntropy.eval(&y_pred, &y_true);
        assert_approx_eq!([loss], [0.16425204], 1e-5);
    }

    #[test]
    fn test_binary_cross_entropy_grad() {
        let y_pred = Tensor::new(&[0.9, 0.2], Dim4::new(&[1, 1, 1, 2]));
        let y_true = Tensor::new(&[1., 0.], Dim4::new(&[1, 1, 1, 2]));
        let grad = BinaryCrossEntropy.grad(&y_pred, &y_true);
        assert_approx_eq!(grad.to_vec(), [-0.5555556, 0.625], 1e-5);
    }

    #[test]
    fn test_loss_from_id() {
        assert_eq!(loss_from_id(BinaryCrossEntropy.id()).unwrap().id(), 1);
        assert!(loss_from_id(42).is_err());
    }
}
