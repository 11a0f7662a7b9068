//! Multi-resolution scheduling of the synthesis.
use arrayfire::*;

use crate::errors::Error;
use crate::imaging::resize_image;
use crate::tensor::*;

/// Computes the shapes the image goes through, from the smallest to the original.
///
/// Shape `i` (for `i` in `1..octaves`) is the original shape divided by `scale^i`, rounded down.
/// No dimension goes below one. The shapes only increase when `scale` is at least one.
pub fn octave_shapes((height, width): (u64, u64), octaves: usize, scale: f64) -> Vec<(u64, u64)> {
    let mut shapes = vec![(height, width)];
    for i in 1..octaves.max(1) {
        let factor = scale.powi(i as i32);
        let shrink = |dim: u64| ((dim as f64 / factor).floor() as u64).max(1);
        shapes.push((shrink(height), shrink(width)));
    }
    shapes.reverse();
    shapes
}

/// Puts the detail lost by the downscaling back in the image.
///
/// # Return value
///
/// Tuple containing the image with the detail restored and the original resized to `shape`, which
/// is the shrunk original of the next octave.
pub fn restore_detail(image: &Tensor,
                      original: &Tensor,
                      shrunk_original: &Tensor,
                      shape: (u64, u64)
) -> (Tensor, Tensor) {
    let upscaled_shrunk_original = resize_image(shrunk_original, shape);
    let same_size_original = resize_image(original, shape);
    let lost_detail = sub(&same_size_original, &upscaled_shrunk_original, false);
    (add(image, &lost_detail, false), same_size_original)
}

/// Runs `dream` on the image at each shape of the schedule, from low to high resolution.
///
/// `dream` receives the index of the octave and the image resized to the shape of the octave.
pub fn loop_octaves<F>(original: &Tensor, shapes: &[(u64, u64)], mut dream: F) -> Result<Tensor, Error>
    where F: FnMut(usize, Tensor) -> Result<Tensor, Error>
{
    let first_shape = match shapes.first() {
        Some(shape) => *shape,
        None => return Ok(original.copy()),
    };

    let mut shrunk_original = resize_image(original, first_shape);
    let mut image = original.copy();

    for (i, &shape) in shapes.iter().enumerate() {
        image = dream(i, resize_image(&image, shape))?;
        let (restored, next_shrunk) = restore_detail(&image, original, &shrunk_original, shape);
        image = restored;
        shrunk_original = next_shrunk;
    }
    Ok(image)
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use crate::assert_approx_eq;
    use crate::dream::octaves::*;
    use crate::imaging::resize_image;
    use crate::tensor::*;

    #[test]
    fn test_octave_shapes() {
        let shapes = octave_shapes((299, 299), 3, 1.4);
        assert_eq!(shapes, vec![(152, 152), (213, 213), (299, 299)]);

        let shapes = octave_shapes((480, 640), 8, 1.3);
        assert_eq!(shapes.len(), 8);
        assert_eq!(*shapes.last().unwrap(), (480, 640));
        for pair in shapes.windows(2) {
            assert!(pair[0].0 <= pair[1].0 && pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_octave_shapes_edge_cases() {
        assert_eq!(octave_shapes((10, 20), 0, 1.3), vec![(10, 20)]);
        assert_eq!(octave_shapes((10, 20), 1, 1.3), vec![(10, 20)]);
        assert_eq!(octave_shapes((3, 2), 4, 4.), vec![(1, 1), (1, 1), (1, 1), (3, 2)]);
    }

    #[test]
    fn test_zero_distortion_is_plain_resize() {
        let original = Tensor::scaled_uniform(-1., 1., Dim4::new(&[40, 30, 3, 1]));
        let shapes = octave_shapes((40, 30), 4, 1.3);

        let mut seen = Vec::new();
        let output = loop_octaves(&original, &shapes, |i, image| {
            if i > 0 {
                // The image entering an octave is the previous output upscaled
                seen.push(image.dims());
            }
            Ok(image)
        }).unwrap();
        assert_eq!(seen.len(), 3);
        assert_approx_eq!(output.to_vec(), original.to_vec(), 1e-4);
    }

    #[test]
    fn test_restore_detail_without_change() {
        let original = Tensor::scaled_uniform(0., 255., Dim4::new(&[20, 16, 3, 1]));
        let shrunk = resize_image(&original, (10, 8));
        let image = resize_image(&shrunk, (15, 12));
        let (restored, next_shrunk) = restore_detail(&image, &original, &shrunk, (15, 12));
        assert_approx_eq!(restored.to_vec(), resize_image(&original, (15, 12)).to_vec(), 1e-3);
        assert_eq!(next_shrunk.dims(), Dim4::new(&[15, 12, 3, 1]));
    }

    #[test]
    fn test_end_to_end_without_iterations() {
        let original = Tensor::scaled_uniform(-1., 1., Dim4::new(&[299, 299, 3, 1]));
        let shapes = octave_shapes((299, 299), 3, 1.4);
        let output = loop_octaves(&original, &shapes, |_, image| Ok(image)).unwrap();
        assert_eq!(output.dims(), original.dims());
        assert_approx_eq!(output.to_vec(), original.to_vec(), 1e-4);
    }
}
