//! Random image augmentation applied during training
use arrayfire::*;
use rand::Rng;
use std::f64::consts::PI;
use std::fmt;

use crate::errors::Error;
use crate::layers::*;
use crate::tensor::*;

/// Randomly flips, rotates and zooms the images of a batch during training.
///
/// The same transformation is applied to every image of a mini-batch. In inference mode the
/// layer is the identity. The backward pass lets the derivative through unchanged.
pub struct RandomAugmentation {
    horizontal_flip: bool,
    rotation_factor: PrimitiveType,
    zoom_factor: PrimitiveType,
    output_shape: Dim,
    training: bool,
}

impl RandomAugmentation {
    pub(crate) const NAME: &'static str = "RandomAugmentation";

    /// Creates an augmentation layer.
    ///
    /// # Arguments
    ///
    /// * `horizontal_flip` - Flip the images horizontally with probability one half.
    /// * `rotation_factor` - Maximum rotation, as a fraction of a full turn, in both directions.
    /// * `zoom_factor` - Maximum relative zoom in or out.
    pub fn new(horizontal_flip: bool, rotation_factor: PrimitiveType, zoom_factor: PrimitiveType) -> Box<RandomAugmentation> {
        Box::new(RandomAugmentation {
            horizontal_flip,
            rotation_factor: rotation_factor.abs(),
            zoom_factor: zoom_factor.abs(),
            output_shape: Dim::new(&[0, 0, 0, 0]),
            training: true,
        })
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<RandomAugmentation>, Error> {
        let horizontal_flip = crate::io::read_scalar::<u64>(group, "horizontal_flip")? != 0;
        let mut layer = RandomAugmentation::new(horizontal_flip, crate::io::read_scalar(group, "rotation_factor")?, crate::io::read_scalar(group, "zoom_factor")?);
        layer.output_shape = read_shape(group, "output_shape")?;
        Ok(layer)
    }

    fn augment(&self, input: &Tensor) -> Tensor {
        let mut rng = rand::thread_rng();
        let mut output = input.copy();

        if self.horizontal_flip && rng.gen::<bool>() {
            output = flip(&output, 1);
        }

        if self.rotation_factor > 0. {
            let turns = rng.gen_range(-self.rotation_factor, self.rotation_factor) as f64;
            output = rotate(&output, turns * 2. * PI, true, InterpType::BILINEAR);
        }

        if self.zoom_factor > 0. {
            let zoom = 1. + rng.gen_range(-self.zoom_factor, self.zoom_factor);
            let height = input.height();
            let width = input.width();
            output = scale(&output, zoom, zoom, height as i64, width as i64, InterpType::BILINEAR);
        }

        output
    }
}

impl Layer for RandomAugmentation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim) {
        self.output_shape = input_shape;
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        input.copy()
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        if self.training {
            self.augment(input)
        } else {
            input.copy()
        }
    }

    fn compute_dactivation_mut(&mut self, input: &Tensor) -> Tensor {
        input.copy()
    }

    fn output_shape(&self) -> Dim {
        self.output_shape
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let augmentation = group.create_group(&layer_group_name(layer_number, Self::NAME))?;
        crate::io::write_scalar(&augmentation, "horizontal_flip", self.horizontal_flip as u64)?;
        crate::io::write_scalar(&augmentation, "rotation_factor", self.rotation_factor)?;
        crate::io::write_scalar(&augmentation, "zoom_factor", self.zoom_factor)?;
        write_shape(&augmentation, "output_shape", self.output_shape)?;
        Ok(())
    }
}

impl fmt::Display for RandomAugmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Augmentation \t 0 \t\t [{}, {}, {}]", self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}

#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::layers::{Layer, RandomAugmentation};
    use crate::tensor::*;

    #[test]
    fn test_augmentation_keeps_shape() {
        let mut layer = RandomAugmentation::new(true, 0.1, 0.2);
        layer.initialize_parameters(Dim4::new(&[16, 12, 3, 1]));
        let input = Tensor::scaled_uniform(0., 1., Dim4::new(&[16, 12, 3, 4]));
        let output = layer.compute_activation_mut(&input);
        assert_eq!(output.dims(), input.dims());
    }

    #[test]
    fn test_augmentation_is_identity_in_inference() {
        let mut layer = RandomAugmentation::new(true, 0.1, 0.2);
        layer.initialize_parameters(Dim4::new(&[8, 8, 3, 1]));
        layer.set_training(false);
        let input = Tensor::scaled_uniform(0., 1., Dim4::new(&[8, 8, 3, 1]));
        let output = layer.compute_activation_mut(&input);
        assert_approx_eq!(output.to_vec(), input.to_vec());
    }
}
