//! Image loading, saving and conversion between raster images and tensors.
//!
//! Images are stored in tensors of dimensions [height, width, 3, 1]. Raw pixel values are in
//! [0, 255]; the network works on values scaled to [-1, 1] by `preprocess`.
use arrayfire::*;
use image::imageops::FilterType;
use image::GenericImageView;
use image::RgbImage;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::errors::Error;
use crate::tensor::*;

const NUM_CHANNELS: u64 = 3;

/// Where the seed image of a run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Image read from the local filesystem.
    File(PathBuf),
    /// Image downloaded from a URL and cached under `name`.
    Url { name: String, url: String },
}

impl ImageSource {
    /// Returns the local path of the image, downloading it first if needed.
    ///
    /// Downloaded images are cached in the user cache directory and reused by name.
    pub fn fetch(&self, verbose: bool) -> Result<PathBuf, Error> {
        self.fetch_in(&cache_dir(), verbose)
    }

    /// Same as `fetch`, with downloaded images cached in `cache`.
    pub fn fetch_in(&self, cache: &Path, verbose: bool) -> Result<PathBuf, Error> {
        match self {
            ImageSource::File(path) => Ok(path.clone()),
            ImageSource::Url { name, url } => {
                let path = cache.join(name);
                if path.exists() {
                    if verbose { println!("Using cached image {}", path.display()); }
                    return Ok(path);
                }
                if verbose { println!("Downloading {} to {}", url, path.display()); }
                download(url, &path)?;
                Ok(path)
            }
        }
    }
}

/// Directory where downloaded images are cached.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("gap")
}

/// Downloads the content at `url` into `destination`.
///
/// The content is first written to a temporary file next to the destination so that an
/// interrupted download never leaves a truncated image behind.
pub fn download(url: &str, destination: &Path) -> Result<(), Error> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let response = ureq::get(url).call()?;
    write_through_partial(&mut response.into_reader(), destination)
}

/// Copies `reader` into `destination` through a `.part` file, which is removed if anything fails.
fn write_through_partial<R: Read + ?Sized>(reader: &mut R, destination: &Path) -> Result<(), Error> {
    let partial = destination.with_extension("part");
    let result = fs::File::create(&partial)
        .and_then(|mut file| io::copy(reader, &mut file))
        .and_then(|_| fs::rename(&partial, destination));
    if let Err(err) = result {
        let _ = fs::remove_file(&partial);
        return Err(err.into());
    }
    Ok(())
}

/// Converts an interleaved RGB image into planar column major values of shape [height, width, 3].
pub fn to_planar(image: &RgbImage) -> Vec<PrimitiveType> {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    let mut values = vec![0 as PrimitiveType; width * height * NUM_CHANNELS as usize];
    for (column, row, pixel) in image.enumerate_pixels() {
        let (column, row) = (column as usize, row as usize);
        for channel in 0..NUM_CHANNELS as usize {
            values[row + height * (column + width * channel)] = pixel[channel] as PrimitiveType;
        }
    }
    values
}

/// Converts planar column major values of shape [height, width, 3] into an RGB image.
///
/// Values are clipped to [0, 255] and truncated.
pub fn from_planar(values: &[PrimitiveType], height: u32, width: u32) -> RgbImage {
    let (h, w) = (height as usize, width as usize);
    RgbImage::from_fn(width, height, |column, row| {
        let (column, row) = (column as usize, row as usize);
        let mut pixel = [0u8; 3];
        for (channel, value) in pixel.iter_mut().enumerate() {
            *value = values[row + h * (column + w * channel)].max(0.).min(255.) as u8;
        }
        image::Rgb(pixel)
    })
}

/// Loads an image as a tensor of raw pixel values.
///
/// # Arguments
///
/// * `path` - The path of the image.
/// * `size` - If given, the (width, height) the image is resized to.
pub fn load_image(path: &Path, size: Option<(u32, u32)>) -> Result<Tensor, Error> {
    let mut image = image::open(path)?;
    if let Some((width, height)) = size {
        if image.width() != width || image.height() != height {
            image = image.resize_exact(width, height, FilterType::Triangle);
        }
    }
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let values = to_planar(&rgb);
    Ok(Tensor::new(&values, Dim4::new(&[height as u64, width as u64, NUM_CHANNELS, 1])))
}

/// Saves a tensor of raw pixel values as an image. The format is deduced from the extension.
pub fn save_image(tensor: &Tensor, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let image = from_planar(&tensor.to_vec(), tensor.height() as u32, tensor.width() as u32);
    image.save(path)?;
    Ok(())
}

/// Scales raw pixel values from [0, 255] to [-1, 1].
pub fn preprocess(tensor: &Tensor) -> Tensor {
    sub(&div(tensor, &(127.5 as PrimitiveType), false), &(1. as PrimitiveType), false)
}

/// Scales network values from [-1, 1] back to [0, 255], clipping values outside the range.
pub fn deprocess(tensor: &Tensor) -> Tensor {
    let scaled = add(&div(tensor, &(2. as PrimitiveType), false), &(0.5 as PrimitiveType), false);
    clamp(&mul(&scaled, &(255. as PrimitiveType), false), &(0. as PrimitiveType), &(255. as PrimitiveType), false)
}

/// Creates an image of uniform noise in [0, 1).
pub fn random_noise(height: u64, width: u64) -> Tensor {
    randu::<PrimitiveType>(Dim4::new(&[height, width, NUM_CHANNELS, 1]))
}

/// Resizes an image with bilinear interpolation. Resizing to the current shape returns a copy.
pub fn resize_image(tensor: &Tensor, (height, width): (u64, u64)) -> Tensor {
    if tensor.height() == height && tensor.width() == width {
        tensor.copy()
    } else {
        resize(tensor, height as i64, width as i64, InterpType::BILINEAR)
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use std::fs;
    use std::io;
    use crate::assert_approx_eq;
    use crate::imaging::*;
    use crate::imaging::{load_image, save_image};
    use crate::tensor::*;

    /// Yields a few bytes, then fails like a dropped connection.
    struct BrokenReader {
        sent: bool,
    }

    impl io::Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            self.sent = true;
            let n = buf.len().min(4);
            buf[..n].copy_from_slice(&b"\x89PNG"[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_planar_conversion() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        image.put_pixel(0, 1, image::Rgb([1, 2, 3]));
        let values = to_planar(&image);

        // Pixel (row 1, column 2) of channel c sits at 1 + 2 * (2 + 3 * c)
        assert_approx_eq!([values[5], values[11], values[17]], [10., 20., 30.]);
        assert_approx_eq!([values[1], values[7], values[13]], [1., 2., 3.]);
        assert_eq!(from_planar(&values, 2, 3), image);
    }

    #[test]
    fn test_preprocess_range() {
        let tensor = Tensor::new(&[0., 127.5, 255.], Dim4::new(&[1, 1, 3, 1]));
        assert_approx_eq!(preprocess(&tensor).to_vec(), [-1., 0., 1.]);
        assert_approx_eq!(deprocess(&preprocess(&tensor)).to_vec(), [0., 127.5, 255.], 1e-4);
    }

    #[test]
    fn test_deprocess_clips() {
        let tensor = Tensor::new(&[-3., 3., 0.], Dim4::new(&[1, 1, 3, 1]));
        assert_approx_eq!(deprocess(&tensor).to_vec(), [0., 255., 127.5], 1e-4);
    }

    #[test]
    fn test_save_and_load_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.png");
        let values: Vec<PrimitiveType> = (0..24).map(|v| (v * 10) as PrimitiveType).collect();
        let tensor = Tensor::new(&values, Dim4::new(&[2, 4, 3, 1]));
        save_image(&tensor, &path).unwrap();

        let loaded = load_image(&path, None).unwrap();
        assert_eq!(loaded.dims(), tensor.dims());
        assert_approx_eq!(loaded.to_vec(), values);

        let resized = load_image(&path, Some((8, 6))).unwrap();
        assert_eq!(resized.dims(), Dim4::new(&[6, 8, 3, 1]));
    }

    #[test]
    fn test_resize_to_same_shape_is_identity() {
        let tensor = Tensor::scaled_uniform(-1., 1., Dim4::new(&[5, 7, 3, 1]));
        assert_approx_eq!(resize_image(&tensor, (5, 7)).to_vec(), tensor.to_vec());
        assert_eq!(resize_image(&tensor, (10, 3)).dims(), Dim4::new(&[10, 3, 3, 1]));
    }

    #[test]
    fn test_file_source_is_returned_as_is() {
        let source = ImageSource::File(PathBuf::from("seed.jpg"));
        assert_eq!(source.fetch(false).unwrap(), PathBuf::from("seed.jpg"));
    }

    #[test]
    fn test_cached_image_is_reused() {
        let cache = tempfile::tempdir().unwrap();
        fs::write(cache.path().join("coast.jpg"), "cached").unwrap();
        let source = ImageSource::Url { name: "coast.jpg".to_string(), url: "http://127.0.0.1:9/coast.jpg".to_string() };

        let path = source.fetch_in(cache.path(), false).unwrap();
        assert_eq!(path, cache.path().join("coast.jpg"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "cached");
    }

    #[test]
    fn test_interrupted_copy_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("coast.jpg");
        assert!(write_through_partial(&mut BrokenReader { sent: false }, &destination).is_err());
        assert!(!destination.exists());
        assert!(!dir.path().join("coast.part").exists());

        write_through_partial(&mut &b"image"[..], &destination).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "image");
        assert!(!dir.path().join("coast.part").exists());
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let cache = tempfile::tempdir().unwrap();
        let source = ImageSource::Url { name: "coast.jpg".to_string(), url: "http://127.0.0.1:9/coast.jpg".to_string() };
        assert!(source.fetch_in(cache.path(), false).is_err());
        assert!(!cache.path().join("coast.jpg").exists());
        assert!(!cache.path().join("coast.part").exists());
    }
}
