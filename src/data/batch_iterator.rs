use arrayfire::*;

use crate::tensor::*;

/// Iterates over mini-batches of samples stacked along the fourth dimension.
///
/// The last mini-batch contains the remaining samples and may be smaller than the others.
pub struct BatchIterator<'a> {
    x: &'a Tensor,
    y: &'a Tensor,
    num_samples: u64,
    batch_size: u64,
    num_batches: u64,
    count: u64,
}

impl<'a> BatchIterator<'a> {
    pub fn new((x, y): (&'a Tensor, &'a Tensor), batch_size: u64) -> BatchIterator<'a> {
        let num_samples = x.batch_size();
        let batch_size = batch_size.max(1).min(num_samples.max(1));
        let num_batches = (num_samples as f64 / batch_size as f64).ceil() as u64;

        BatchIterator {
            x,
            y,
            num_samples,
            batch_size,
            num_batches,
            count: 0,
        }
    }

    pub fn num_batches(&self) -> u64 {
        self.num_batches
    }
}

impl<'a> Iterator for BatchIterator<'a> {
    type Item = (Tensor, Tensor);

    fn next(&mut self) -> Option<Self::Item> {
        if self.count < self.num_batches {
            // Bounds of the sequence are inclusive
            let lb = self.count * self.batch_size;
            let ub = ((self.count + 1) * self.batch_size).min(self.num_samples) - 1;
            let seqs = [Seq::default(), Seq::default(), Seq::default(), Seq::new(lb as f64, ub as f64, 1.0)];

            self.count += 1;
            Some((index(self.x, &seqs), index(self.y, &seqs)))
        } else {
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::data::BatchIterator;
    use crate::tensor::*;

    #[test]
    fn test_batch_iterator() {
        let x = Tensor::new(&[1., 2., 3., 4., 5.], Dim4::new(&[1, 1, 1, 5]));
        let y = Tensor::new(&[10., 20., 30., 40., 50.], Dim4::new(&[1, 1, 1, 5]));
        let batches = BatchIterator::new((&x, &y), 2);
        assert_eq!(batches.num_batches(), 3);

        let batches: Vec<(Tensor, Tensor)> = batches.collect();
        assert_eq!(batches.len(), 3);
        assert_approx_eq!(batches[0].0.to_vec(), [1., 2.]);
        assert_approx_eq!(batches[1].1.to_vec(), [30., 40.]);
        assert_approx_eq!(batches[2].0.to_vec(), [5.]);
    }

    #[test]
    fn test_batch_larger_than_samples() {
        let x = Tensor::new(&[1., 2., 3.], Dim4::new(&[1, 1, 1, 3]));
        let batches: Vec<(Tensor, Tensor)> = BatchIterator::new((&x, &x), 32).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0.batch_size(), 3);
    }
}
