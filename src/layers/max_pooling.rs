//! 2D max pooling layer
use arrayfire::*;
use std::fmt;

use crate::errors::Error;
use crate::layers::*;
use crate::tensor::*;

/// Defines a 2D max pooling layer.
pub struct MaxPool2D {
    pool_size: (u64, u64),
    stride: (u64, u64),
    input_shape: Dim,
    output_shape: Dim,
    previous_input_shape: Dim,
    max_indices: Option<Array<u32>>,
}

impl MaxPool2D {

    pub(crate) const NAME: &'static str = "MaxPool2D";

    /// Creates a 2D max pooling layer.
    ///
    /// By default, the horizontal and vertical strides are set to the height and width of the pooling window.
    ///
    /// # Arguments
    ///
    /// * `pool_size` - The height and width of the pooling window.
    pub fn new(pool_size: (u64, u64)) -> Box<MaxPool2D> {
        MaxPool2D::with_param(pool_size, pool_size)
    }


    /// Creates a 2D max pooling layer with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `pool_size` - The height and width of the moving window.
    /// * `stride` - The vertical and horizontal stride.
    pub fn with_param(pool_size: (u64, u64), stride: (u64, u64)) -> Box<MaxPool2D> {
        Box::new(MaxPool2D {
            pool_size,
            stride,
            input_shape: Dim::new(&[0, 0, 0, 0]),
            output_shape: Dim::new(&[0, 0, 0, 0]),
            previous_input_shape: Dim::new(&[0, 0, 0, 0]),
            max_indices: None,
        })
    }

    /// Creates a MaxPool2D layer from an HDF5 group.
    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<MaxPool2D>, Error> {
        let mut layer = MaxPool2D::with_param(read_pair(group, "pool_size")?, read_pair(group, "stride")?);
        layer.input_shape = read_shape(group, "input_shape")?;
        layer.output_shape = read_shape(group, "output_shape")?;
        Ok(layer)
    }

    fn output_size(&self, height: u64, width: u64) -> (u64, u64) {
        let output_height = height.saturating_sub(self.pool_size.0) / self.stride.0 + 1;
        let output_width = width.saturating_sub(self.pool_size.1) / self.stride.1 + 1;
        (output_height, output_width)
    }

    /// Computes the maximum value in each pooling window and the position of the maximum in the window.
    fn max_pool(&self, input: &Tensor) -> (Tensor, Array<u32>) {
        let dims = input.dims();
        let (output_height, output_width) = self.output_size(dims[0], dims[1]);
        let cols = unwrap(input, self.pool_size.0 as i64, self.pool_size.1 as i64, self.stride.0 as i64, self.stride.1 as i64, 0, 0, true);
        let (max_values, max_indices) = imax(&cols, 0);
        let output = moddims(&max_values, Dim::new(&[output_height, output_width, dims[2], dims[3]]));
        (output, max_indices)
    }
}

impl Layer for MaxPool2D {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize_parameters(&mut self, input_shape: Dim4) {
        let (output_height, output_width) = self.output_size(input_shape[0], input_shape[1]);
        self.input_shape = input_shape;
        self.output_shape = Dim4::new(&[output_height, output_width, input_shape[2], input_shape[3]]);
    }

    fn compute_activation(&self, input: &Tensor) -> Tensor {
        let (output, _) = self.max_pool(input);
        output
    }

    fn compute_activation_mut(&mut self, input: &Tensor) -> Tensor {
        let (output, max_indices) = self.max_pool(input);
        self.max_indices = Some(max_indices);
        self.previous_input_shape = input.dims();
        output
    }

    fn compute_dactivation_mut(&mut self, input: &Tensor) -> Tensor {
        let max_indices = match &self.max_indices {
            Some(max_indices) => max_indices,
            None => panic!("The pooling indices have not been computed!"),
        };

        // One hot mask of the maximum in each window, scaled by the incoming derivative
        let window_size = self.pool_size.0 * self.pool_size.1;
        let index_dims = max_indices.dims();
        let positions = range::<u32>(Dim::new(&[window_size, index_dims[1], index_dims[2], index_dims[3]]), 0);
        let mask = eq(&positions, &tile(max_indices, Dim::new(&[window_size, 1, 1, 1])), false);
        let dinput = moddims(input, index_dims);
        let dcols = mul(&mask.cast::<PrimitiveType>(), &tile(&dinput, Dim::new(&[window_size, 1, 1, 1])), false);

        wrap(&dcols, self.previous_input_shape[0] as i64, self.previous_input_shape[1] as i64, self.pool_size.0 as i64, self.pool_size.1 as i64, self.stride.0 as i64, self.stride.1 as i64, 0, 0, true)
    }

    fn output_shape(&self) -> Dim {
        self.output_shape
    }

    fn spatial_output_size(&self, (height, width): (u64, u64)) -> Option<(u64, u64)> {
        if height < self.pool_size.0 || width < self.pool_size.1 {
            return None;
        }
        Some(self.output_size(height, width))
    }

    fn save(&self, group: &hdf5::Group, layer_number: usize) -> Result<(), Error> {
        let max_pool = group.create_group(&layer_group_name(layer_number, Self::NAME))?;

        write_pair(&max_pool, "pool_size", self.pool_size)?;
        write_pair(&max_pool, "stride", self.stride)?;
        write_shape(&max_pool, "input_shape", self.input_shape)?;
        write_shape(&max_pool, "output_shape", self.output_shape)?;

        Ok(())
    }
}


impl fmt::Display for MaxPool2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \t 0 \t\t [{}, {}, {}]", Self::NAME, self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}
