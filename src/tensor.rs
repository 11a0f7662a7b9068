//! Tensor type of the crate and the helpers the layers rely on.
use arrayfire::*;
use rand::thread_rng;
use rand::seq::SliceRandom;

pub type PrimitiveType = f32;
pub type Tensor = Array<PrimitiveType>;
pub type Dim = Dim4;

pub(crate) const BATCH_AXIS: usize = 3;

/// Lower bound of the squared norm used when normalizing a gradient.
const NORM_EPSILON: PrimitiveType = 1e-12;

pub trait TensorTrait {
    fn ones(dims: Dim4) -> Tensor;
    fn zeros(dims: Dim4) -> Tensor;
    fn new_empty_tensor() -> Tensor;
    fn batch_size(&self) -> u64;
    fn height(&self) -> u64;
    fn width(&self) -> u64;
    fn shuffle(x: &Tensor, y: &Tensor) -> (Tensor, Tensor);
    fn scaled_uniform(lower_bound: PrimitiveType, upper_bound: PrimitiveType, dims: Dim4) -> Tensor;
    fn flatten(&self) -> Tensor;
    fn reshape(&self, dims: Dim4) -> Tensor;
    fn l2_normalize(&self) -> Tensor;
    fn to_vec(&self) -> Vec<PrimitiveType>;
}

impl TensorTrait for Tensor {
    fn ones(dims: Dim4) -> Tensor {
        constant(1.0 as PrimitiveType, dims)
    }

    fn zeros(dims: Dim4) -> Tensor {
        constant(0.0 as PrimitiveType, dims)
    }

    fn new_empty_tensor() -> Tensor {
        Array::new_empty(Dim4::new(&[0, 0, 0, 0]))
    }

    fn batch_size(&self) -> u64 {
        self.dims().get()[BATCH_AXIS]
    }

    fn height(&self) -> u64 {
        self.dims().get()[0]
    }

    fn width(&self) -> u64 {
        self.dims().get()[1]
    }

    /// Shuffles the samples of two tensors along the batch axis with the same permutation.
    fn shuffle(x: &Tensor, y: &Tensor) -> (Tensor, Tensor) {
        assert_eq!(x.batch_size(), y.batch_size());

        let mut indices: Vec<u32> = (0..x.batch_size() as u32).collect();
        indices.shuffle(&mut thread_rng());
        let indices = Array::new(&indices[..], Dim4::new(&[x.batch_size(), 1, 1, 1]));

        (lookup(x, &indices, BATCH_AXIS as i32), lookup(y, &indices, BATCH_AXIS as i32))
    }

    fn scaled_uniform(lower_bound: PrimitiveType, upper_bound: PrimitiveType, dims: Dim4) -> Tensor {
        constant(lower_bound, dims) + constant(upper_bound - lower_bound, dims) * randu::<PrimitiveType>(dims)
    }

    fn flatten(&self) -> Tensor {
        let dim0 = self.dims()[0];
        let dim1 = self.dims()[1];
        let dim2 = self.dims()[2];
        let dims = Dim4::new(&[dim0 * dim1 * dim2, 1, 1, self.batch_size()]);
        self.reshape(dims)
    }

    fn reshape(&self, dims: Dim4) -> Tensor {
        moddims(self, dims)
    }

    /// Divides the tensor by its L2 norm computed over all the elements.
    fn l2_normalize(&self) -> Tensor {
        let squared_norm = sum_all(&mul(self, self, false)).0 as PrimitiveType;
        let norm = squared_norm.max(NORM_EPSILON).sqrt();
        div(self, &norm, false)
    }

    fn to_vec(&self) -> Vec<PrimitiveType> {
        let mut buffer = vec![0 as PrimitiveType; self.elements()];
        self.host(&mut buffer);
        buffer
    }
}


/// Representation of a tensor stored in an HDF5 file.
#[derive(hdf5::H5Type, Clone, Debug)]
#[repr(C)]
pub(crate) struct H5Tensor {
    dims: [u64; 4],
    values: hdf5::types::VarLenArray<PrimitiveType>,
}

impl From<&Tensor> for H5Tensor {
    fn from(tensor: &Tensor) -> Self {
        H5Tensor {
            dims: *tensor.dims().get(),
            values: hdf5::types::VarLenArray::from_slice(&tensor.to_vec()),
        }
    }
}

impl From<&H5Tensor> for Tensor {
    fn from(h5_tensor: &H5Tensor) -> Self {
        Tensor::new(h5_tensor.values.as_slice(), Dim4::new(&h5_tensor.dims))
    }
}


#[cfg(test)]
mod tests {
    use crate::tensor::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_l2_normalize() {
        let tensor = Tensor::new(&[3., 0., -4., 0., 12., 0.], Dim4::new(&[3, 2, 1, 1]));
        let normalized = tensor.l2_normalize();
        let expected_output = [3. / 13., 0., -4. / 13., 0., 12. / 13., 0.];
        assert_approx_eq!(normalized.to_vec(), expected_output);

        let norm = sum_all(&mul(&normalized, &normalized, false)).0 as PrimitiveType;
        assert_approx_eq!([norm], [1.], 1e-5);
    }

    #[test]
    fn test_l2_normalize_zero_tensor() {
        let tensor = Tensor::zeros(Dim4::new(&[4, 4, 3, 1]));
        let normalized = tensor.l2_normalize();
        assert_approx_eq!(normalized.to_vec(), vec![0.; 48]);
    }

    #[test]
    fn test_flatten() {
        let tensor = Tensor::ones(Dim4::new(&[2, 3, 4, 5]));
        let flattened = tensor.flatten();
        assert_eq!(flattened.dims(), Dim4::new(&[24, 1, 1, 5]));
    }

    #[test]
    fn test_shuffle_keeps_pairs() {
        let x = Tensor::new(&[0., 10., 1., 11., 2., 12., 3., 13.], Dim4::new(&[2, 1, 1, 4]));
        let y = Tensor::new(&[0., 1., 2., 3.], Dim4::new(&[1, 1, 1, 4]));
        let (x_shuffled, y_shuffled) = Tensor::shuffle(&x, &y);
        let x_values = x_shuffled.to_vec();
        let y_values = y_shuffled.to_vec();
        for (i, label) in y_values.iter().enumerate() {
            assert_approx_eq!([x_values[2 * i], x_values[2 * i + 1]], [*label, *label + 10.]);
        }
    }

    #[test]
    fn test_h5_tensor_conversion() {
        let tensor = Tensor::new(&[1., 2., 3., 4., 5., 6.], Dim4::new(&[1, 2, 3, 1]));
        let h5_tensor = H5Tensor::from(&tensor);
        let restored = Tensor::from(&h5_tensor);
        assert_eq!(restored.dims(), tensor.dims());
        assert_approx_eq!(restored.to_vec(), tensor.to_vec());
    }
}
