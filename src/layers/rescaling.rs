use arrayfire::*;
use std::fmt;

use crate::errors::Error;
use crate::layers::*;
use crate::tensor::*;

/// Multiplies its input by `scale` and adds `offset`.
pub struct Rescaling {
    scale: PrimitiveType,
    offset: PrimitiveType,
    output_shape: Dim,
}

impl Rescaling {
    pub(crate) const NAME: &'static str = "Rescaling";

    pub fn new(scale: PrimitiveType, offset: PrimitiveType) -> Box<Rescaling> {
        Box::new(Rescaling {
            scale,
            offset,
            output_shape: Dim::new(&[0, 0, 0, 0]),
        })
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Rescaling>, Error> {
        let mut layer = Rescaling::new(crate::io::read_scalar(group, "scale")?, crate::io::read_scalar(group, "offset")?);
        layer.output_shape = read_shape(group, "output_shape")?;
        Ok(layer)
    }
}

impl Layer for Rescaling {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim) {
        self.output_shape = input_shape;
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        add(&mul(input, &self.scale, false), &self.offset, false)
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        self.compute_activation(input)
    }

    fn compute_dactivation_mut(&mut self, input: &Tensor) -> Tensor {
        mul(input, &self.scale, false)
    }

    fn output_shape(&self) -> Dim {
        self.output_shape
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let rescaling = group.create_group(&layer_group_name(layer_number, Self::NAME))?;
        crate::io::write_scalar(&rescaling, "scale", self.scale)?;
        crate::io::write_scalar(&rescaling, "offset", self.offset)?;
        write_shape(&rescaling, "output_shape", self.output_shape)?;
        Ok(())
    }
}

impl fmt::Display for Rescaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \t 0 \t\t [{}, {}, {}]", Self::NAME, self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}

#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::layers::{Layer, Rescaling};
    use crate::tensor::*;

    #[test]
    fn test_rescaling() {
        let mut layer = Rescaling::new(1. / 255., 0.);
        layer.initialize_parameters(Dim4::new(&[2, 1, 1, 1]));
        let output = layer.compute_activation_mut(&Tensor::new(&[0., 255.], Dim4::new(&[2, 1, 1, 1])));
        assert_approx_eq!(output.to_vec(), [0., 1.]);

        let dinput = layer.compute_dactivation_mut(&Tensor::new(&[255., 510.], Dim4::new(&[2, 1, 1, 1])));
        assert_approx_eq!(dinput.to_vec(), [1., 2.], 1e-5);
    }
}
