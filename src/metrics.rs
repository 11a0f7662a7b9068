use arrayfire::*;
use crate::tensor::*;

/// Metrics reported alongside the loss during training and evaluation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Metrics {
    /// Fraction of correctly classified samples. Single output networks are thresholded at 0.5.
    Accuracy,
}

impl Metrics {
    pub fn name(&self) -> &str {
        match self {
            Metrics::Accuracy => "accuracy",
        }
    }

    pub(crate) fn eval(&self, y_pred: &Tensor, y_true: &Tensor) -> PrimitiveType {
        match self {
            Metrics::Accuracy => {
                let mb_size = y_true.batch_size();
                let num_classes = y_true.dims().get()[0];
                let (predicted_class, true_class) = if num_classes == 1 {
                    let predicted_class = ge(y_pred, &(0.5 as PrimitiveType), false).cast::<u32>();
                    let true_class = ge(y_true, &(0.5 as PrimitiveType), false).cast::<u32>();
                    (predicted_class, true_class)
                } else {
                    let predicted_class = imax(y_pred, 0).1;
                    let true_class = imax(y_true, 0).1;
                    (predicted_class, true_class)
                };
                let num_correctly_classified = eq(&predicted_class, &true_class, false);
                sum_all(&num_correctly_classified).0 as PrimitiveType / mb_size as PrimitiveType
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::metrics::Metrics;
    use crate::assert_approx_eq;

    #[test]
    fn test_accuracy() {
        let predictions = [0.1, 0.3, 0.6, 0.15, 0.8, 0.05, 0.6, 0.3, 0.1];
        let true_values = [0., 0., 1., 0., 1., 0., 0., 1., 0.];
        let y_pred = Array::new(&predictions, Dim4::new(&[3, 1, 1, 3]));
        let y_true = Array::new(&true_values, Dim4::new(&[3, 1, 1, 3]));

        let metrics = Metrics::Accuracy;
        let score = metrics.eval(&y_pred, &y_true);
        assert_approx_eq!([score], [0.6666666]);
    }

    #[test]
    fn test_binary_accuracy() {
        let y_pred = Array::new(&[0.9, 0.4, 0.2, 0.7], Dim4::new(&[1, 1, 1, 4]));
        let y_true = Array::new(&[1., 1., 0., 0.], Dim4::new(&[1, 1, 1, 4]));
        let score = Metrics::Accuracy.eval(&y_pred, &y_true);
        assert_approx_eq!([score], [0.5]);
    }
}
