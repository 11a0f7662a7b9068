use arrayfire::*;
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{is_hidden, DataSet, DataSetError};
use crate::imaging::to_planar;
use crate::tensor::*;

pub const TRAIN_SUBSET: &str = "train";
pub const VALID_SUBSET: &str = "validation";
pub const TEST_SUBSET: &str = "test";

/// Image samples split into training, validation and test subsets.
///
/// Raw pixel values in [0, 255] are kept; scaling is left to the network. With two classes the
/// labels are a single value (0 or 1) per sample, otherwise they are one hot encoded.
pub struct ImageDataSet {
    input_shape: Dim,
    output_shape: Dim,
    classes: Vec<String>,
    x_train: Tensor,
    y_train: Tensor,
    x_valid: Option<Tensor>,
    y_valid: Option<Tensor>,
    x_test: Option<Tensor>,
    y_test: Option<Tensor>,
}

impl ImageDataSet {

    /// Loads an image data set in memory.
    ///
    /// # Arguments
    /// * `path`: directory containing a `train` subdirectory and optionally `validation` and
    ///   `test` subdirectories, each split in one subdirectory per class
    /// * `image_size`: (width, height) the images are resized to
    ///
    pub fn from_path(path: &Path, image_size: (u32, u32)) -> Result<ImageDataSet, DataSetError> {
        if !path.exists() {
            return Err(DataSetError::PathDoesNotExist(path.to_path_buf()));
        }

        let train_path = path.join(TRAIN_SUBSET);
        if !train_path.exists() {
            return Err(DataSetError::SubsetDoesNotExist(train_path));
        }
        let classes = Self::list_classes(&train_path)?;
        if classes.len() < 2 {
            return Err(DataSetError::ClassCount(classes.len()));
        }

        let (x_train, y_train) = Self::load_subset(&train_path, &classes, image_size)?;
        let (x_valid, y_valid) = Self::load_optional_subset(&path.join(VALID_SUBSET), &classes, image_size)?;
        let (x_test, y_test) = Self::load_optional_subset(&path.join(TEST_SUBSET), &classes, image_size)?;

        let input_shape = Dim::new(&[image_size.1 as u64, image_size.0 as u64, 3, 1]);
        let output_shape = Dim::new(&[Self::label_size(classes.len()), 1, 1, 1]);

        Ok(ImageDataSet {
            input_shape,
            output_shape,
            classes,
            x_train,
            y_train,
            x_valid,
            y_valid,
            x_test,
            y_test,
        })
    }

    fn label_size(num_classes: usize) -> u64 {
        if num_classes == 2 { 1 } else { num_classes as u64 }
    }

    /// Returns the names of the class subdirectories, sorted.
    fn list_classes(path: &Path) -> Result<Vec<String>, DataSetError> {
        let mut classes = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1).into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                classes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        classes.sort();
        Ok(classes)
    }

    fn load_optional_subset(path: &Path,
                            classes: &[String],
                            image_size: (u32, u32)
    ) -> Result<(Option<Tensor>, Option<Tensor>), DataSetError> {
        if path.exists() {
            let (x, y) = Self::load_subset(path, classes, image_size)?;
            Ok((Some(x), Some(y)))
        } else {
            Ok((None, None))
        }
    }

    /// Loads the images of a subset in a single tensor and creates the labels.
    fn load_subset(path: &Path,
                   classes: &[String],
                   image_size: (u32, u32)
    ) -> Result<(Tensor, Tensor), DataSetError> {
        if Self::list_classes(path)? != classes {
            return Err(DataSetError::ClassMismatch);
        }

        let mut files: Vec<(usize, PathBuf)> = Vec::new();
        for (class_index, class) in classes.iter().enumerate() {
            let mut class_files = Vec::new();
            for entry in WalkDir::new(path.join(class)).min_depth(1).max_depth(1).into_iter().filter_entry(|e| !is_hidden(e)) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    class_files.push(entry.into_path());
                }
            }
            class_files.sort();
            files.extend(class_files.into_iter().map(|file| (class_index, file)));
        }
        if files.is_empty() {
            return Err(DataSetError::NoSamples(path.to_path_buf()));
        }

        let (width, height) = image_size;
        let num_samples = files.len();
        let label_size = Self::label_size(classes.len()) as usize;
        let mut x_values: Vec<PrimitiveType> = Vec::with_capacity(num_samples * (width * height * 3) as usize);
        let mut y_values: Vec<PrimitiveType> = vec![0.; num_samples * label_size];

        let progress_bar = ProgressBar::new(num_samples as u64);
        progress_bar.set_style(ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50}] {pos}/{len} {msg}")
            .progress_chars("##-"));
        progress_bar.set_message(&format!("loading {}", path.display()));

        for (sample, (class_index, file)) in files.iter().enumerate() {
            let img = image::open(file)?.resize_exact(width, height, FilterType::Triangle).to_rgb8();
            x_values.extend(to_planar(&img));

            if label_size == 1 {
                y_values[sample] = *class_index as PrimitiveType;
            } else {
                y_values[class_index + label_size * sample] = 1.;
            }
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        let x = Tensor::new(&x_values[..], Dim4::new(&[height as u64, width as u64, 3, num_samples as u64]));
        let y = Tensor::new(&y_values[..], Dim4::new(&[label_size as u64, 1, 1, num_samples as u64]));
        Ok((x, y))
    }
}

impl DataSet for ImageDataSet {
    fn input_shape(&self) -> Dim { self.input_shape }

    fn output_shape(&self) -> Dim { self.output_shape }

    fn num_train_samples(&self) -> u64 { self.x_train.batch_size() }

    fn num_valid_samples(&self) -> u64 {
        self.x_valid.as_ref().map(|x| x.batch_size()).unwrap_or(0)
    }

    fn classes(&self) -> Option<Vec<String>> { Some(self.classes.clone()) }

    fn x_train(&self) -> &Tensor { &self.x_train }

    fn y_train(&self) -> &Tensor { &self.y_train }

    fn x_valid(&self) -> Option<&Tensor> { self.x_valid.as_ref() }

    fn y_valid(&self) -> Option<&Tensor> { self.y_valid.as_ref() }

    fn x_test(&self) -> Option<&Tensor> { self.x_test.as_ref() }

    fn y_test(&self) -> Option<&Tensor> { self.y_test.as_ref() }
}

impl fmt::Display for ImageDataSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Classes: {:?}", self.classes)?;
        writeln!(f, "Number of training samples: {}", self.num_train_samples())?;
        writeln!(f, "Number of validation samples: {}", self.num_valid_samples())?;
        writeln!(f, "Number of test samples: {}", self.x_test.as_ref().map(|x| x.batch_size()).unwrap_or(0))?;
        writeln!(f, "Input shape: [{}, {}, {}]", self.input_shape[0], self.input_shape[1], self.input_shape[2])?;
        write!(f, "Output shape: [{}, {}, {}]", self.output_shape[0], self.output_shape[1], self.output_shape[2])
    }
}


#[cfg(test)]
mod tests {
    use arrayfire::*;
    use image::RgbImage;
    use std::fs;
    use std::path::Path;
    use crate::assert_approx_eq;
    use crate::data::{DataSet, DataSetError, ImageDataSet};
    use crate::tensor::*;

    fn write_image(path: &Path, value: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(6, 4, image::Rgb([value, value, value])).save(path).unwrap();
    }

    #[test]
    fn test_binary_image_data_set() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("train/notladybug/a.png"), 10);
        write_image(&dir.path().join("train/ladybug/a.png"), 200);
        write_image(&dir.path().join("train/ladybug/b.png"), 100);
        write_image(&dir.path().join("validation/ladybug/c.png"), 50);
        write_image(&dir.path().join("validation/notladybug/d.png"), 60);

        let data = ImageDataSet::from_path(dir.path(), (3, 2)).unwrap();
        assert_eq!(data.classes().unwrap(), vec!["ladybug".to_string(), "notladybug".to_string()]);
        assert_eq!(data.num_train_samples(), 3);
        assert_eq!(data.num_valid_samples(), 2);
        assert_eq!(data.x_train().dims(), Dim4::new(&[2, 3, 3, 3]));
        assert_eq!(data.output_shape(), Dim4::new(&[1, 1, 1, 1]));
        assert_approx_eq!(data.y_train().to_vec(), [0., 0., 1.]);
        assert!(data.x_test().is_none());

        // Uniform images stay uniform after resizing
        let first_sample = index(data.x_train(), &[Seq::default(), Seq::default(), Seq::default(), Seq::new(0.0, 0.0, 1.0)]);
        assert_approx_eq!(first_sample.to_vec(), vec![200.; 18], 1.5);
    }

    #[test]
    fn test_one_hot_labels() {
        let dir = tempfile::tempdir().unwrap();
        for (i, class) in ["a", "b", "c"].iter().enumerate() {
            write_image(&dir.path().join("train").join(class).join("x.png"), i as u8);
        }
        let data = ImageDataSet::from_path(dir.path(), (2, 2)).unwrap();
        assert_eq!(data.output_shape(), Dim4::new(&[3, 1, 1, 1]));
        assert_approx_eq!(data.y_train().to_vec(), [1., 0., 0., 0., 1., 0., 0., 0., 1.]);
    }

    #[test]
    fn test_missing_train_subset() {
        let dir = tempfile::tempdir().unwrap();
        match ImageDataSet::from_path(dir.path(), (2, 2)) {
            Err(DataSetError::SubsetDoesNotExist(_)) => {},
            _ => panic!("expected a missing subset error"),
        }
    }

    #[test]
    fn test_class_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("train/a/x.png"), 1);
        write_image(&dir.path().join("train/b/x.png"), 1);
        write_image(&dir.path().join("test/a/x.png"), 1);
        match ImageDataSet::from_path(dir.path(), (2, 2)) {
            Err(DataSetError::ClassMismatch) => {},
            _ => panic!("expected a class mismatch"),
        }
    }
}
