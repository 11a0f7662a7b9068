//! Normalized gradient steps on the input of a network.
use arrayfire::*;
use indicatif::ProgressBar;

use crate::dream::extractor::Objective;
use crate::dream::StopCriterion;
use crate::errors::Error;
use crate::models::Network;
use crate::tensor::*;

/// Moves the image by `rate` along the L2 normalized gradient of the objective.
///
/// A negative rate descends the objective.
///
/// # Return value
///
/// Tuple containing the value of the objective before the step and the updated image.
pub fn gradient_ascent_step<O: Objective + ?Sized>(network: &mut Network,
                                                   objective: &O,
                                                   image: &Tensor,
                                                   rate: PrimitiveType
) -> Result<(PrimitiveType, Tensor), Error> {
    let (loss, grad) = objective.loss_and_gradient(network, image)?;
    let step = mul(&grad.l2_normalize(), &rate, false);
    Ok((loss, add(image, &step, false)))
}

/// Runs at most `iterations` gradient ascent steps.
///
/// The loop stops after the first step whose loss meets the stop criterion; that step is still
/// applied to the image.
///
/// # Return value
///
/// Tuple containing the image and the loss of the last step, if any step was made.
pub fn gradient_ascent_loop<O: Objective + ?Sized>(network: &mut Network,
                                                   objective: &O,
                                                   image: &Tensor,
                                                   iterations: usize,
                                                   rate: PrimitiveType,
                                                   stop: Option<StopCriterion>,
                                                   progress_bar: Option<&ProgressBar>,
) -> Result<(Tensor, Option<PrimitiveType>), Error> {
    let mut image = image.copy();
    let mut last_loss = None;

    for _ in 0..iterations {
        let (loss, next) = gradient_ascent_step(network, objective, &image, rate)?;
        image = next;
        last_loss = Some(loss);

        if let Some(progress_bar) = progress_bar {
            progress_bar.set_message(&format!("loss: {:.4}", loss));
            progress_bar.inc(1);
        }
        if stop.map(|criterion| criterion.is_met(loss)).unwrap_or(false) {
            break;
        }
    }
    Ok((image, last_loss))
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::dream::ascent::*;
    use crate::dream::extractor::{FeatureExtractor, LayerWeights};
    use crate::dream::StopCriterion;
    use crate::layers::Rescaling;
    use crate::losses::BinaryCrossEntropy;
    use crate::models::Network;
    use crate::optimizers::SGD;
    use crate::tensor::*;

    fn identity_network() -> (Network, FeatureExtractor) {
        let mut network = Network::new(Dim4::new(&[2, 2, 1, 1]), BinaryCrossEntropy, SGD::new(0.1)).unwrap();
        network.add_named("identity", Rescaling::new(1., 0.)).unwrap();
        let extractor = FeatureExtractor::new(&network, &LayerWeights::single("identity", 1.), 0).unwrap();
        (network, extractor)
    }

    #[test]
    fn test_step_has_norm_of_rate() {
        let (mut network, extractor) = identity_network();
        let image = Tensor::new(&[3., 0., 0., 4.], Dim4::new(&[2, 2, 1, 1]));
        let (loss, next) = gradient_ascent_step(&mut network, &extractor, &image, 10.).unwrap();

        // mean of the squares, gradient along the image itself
        assert_approx_eq!([loss], [6.25]);
        assert_approx_eq!(next.to_vec(), [9., 0., 0., 12.], 1e-4);
    }

    #[test]
    fn test_zero_gradient_leaves_image() {
        let (mut network, extractor) = identity_network();
        let image = Tensor::zeros(Dim4::new(&[2, 2, 1, 1]));
        let (_, next) = gradient_ascent_step(&mut network, &extractor, &image, 10.).unwrap();
        assert_approx_eq!(next.to_vec(), [0., 0., 0., 0.]);
    }

    #[test]
    fn test_early_stop() {
        let (mut network, extractor) = identity_network();
        let image = Tensor::new(&[2., 0., 0., 0.], Dim4::new(&[2, 2, 1, 1]));

        // Losses of the successive steps are 1, 4 and 9
        let (_, loss) = gradient_ascent_loop(&mut network, &extractor, &image, 10, 2., Some(StopCriterion::AtLeast(4.)), None).unwrap();
        assert_approx_eq!([loss.unwrap()], [4.], 1e-4);

        let (output, loss) = gradient_ascent_loop(&mut network, &extractor, &image, 10, 2., Some(StopCriterion::Above(4.)), None).unwrap();
        assert_approx_eq!([loss.unwrap()], [9.], 1e-4);
        assert_approx_eq!(output.to_vec(), [8., 0., 0., 0.], 1e-4);

        let (output, loss) = gradient_ascent_loop(&mut network, &extractor, &image, 0, 2., None, None).unwrap();
        assert_eq!(loss, None);
        assert_approx_eq!(output.to_vec(), [2., 0., 0., 0.]);
    }
}
