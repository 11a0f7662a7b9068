use hdf5::Group;
use std::fmt;

use crate::errors::Error;
use crate::layers::*;
use crate::tensor::*;

/// Flattens the height, width and channels of its input into a single axis.
pub struct Flatten {
    input_shape: Dim,
    output_shape: Dim,
}

impl Flatten {
    pub(crate) const NAME: &'static str = "Flatten";

    pub fn new() -> Box<Flatten> {
        Box::new(Flatten {
            input_shape: Dim::new(&[0, 0, 0, 0]),
            output_shape: Dim::new(&[0, 0, 0, 0]),
        })
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Flatten>, Error> {
        Ok(Box::new(Flatten {
            input_shape: read_shape(group, "input_shape")?,
            output_shape: read_shape(group, "output_shape")?,
        }))
    }

}

impl Layer for Flatten {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim) {
        self.input_shape = input_shape;
        self.output_shape = Dim::new(&[input_shape.get()[0] * input_shape.get()[1] * input_shape.get()[2], 1, 1, 1]);
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        input.flatten()
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        input.flatten()
    }

    fn compute_dactivation_mut(&mut self, input: &Tensor) -> Tensor {
        input.reshape(Dim::new(&[self.input_shape.get()[0], self.input_shape.get()[1], self.input_shape.get()[2], input.dims().get()[3]]))
    }

    fn output_shape(&self) -> Dim {
        self.output_shape
    }

    fn is_resizable(&self) -> bool {
        false
    }

    fn save(&self, group: &Group, layer_number: usize) -> Result<(), Error> {
        let flatten = group.create_group(&layer_group_name(layer_number, Self::NAME))?;
        write_shape(&flatten, "input_shape", self.input_shape)?;
        write_shape(&flatten, "output_shape", self.output_shape)?;
        Ok(())
    }
}

impl fmt::Display for Flatten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \t\t 0 \t\t [{}, {}, {}]", Self::NAME, self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}
