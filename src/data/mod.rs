//! Data sets and the file utilities that prepare them.
pub mod batch_iterator;
pub mod image_data;
pub mod rename;
pub mod resize;
pub mod subsets;

pub use self::batch_iterator::BatchIterator;
pub use self::image_data::ImageDataSet;

use std::fmt;
use std::io;
use std::path::PathBuf;
use walkdir::DirEntry;

use crate::tensor::*;


#[derive(Debug)]
pub enum DataSetError {
    Io(io::Error),
    Image(image::ImageError),
    PathDoesNotExist(PathBuf),
    SubsetDoesNotExist(PathBuf),
    AlreadyExists(PathBuf),
    ClassCount(usize),
    ClassMismatch,
    NoSamples(PathBuf),
    DimensionMismatch,
}

impl fmt::Display for DataSetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DataSetError::Io(ref err) => write!(f, "IO error: {}", err),
            DataSetError::Image(ref err) => write!(f, "Image error: {}", err),
            DataSetError::PathDoesNotExist(ref path) => write!(f, "The path {} doesn't exist.", path.display()),
            DataSetError::SubsetDoesNotExist(ref path) => write!(f, "The subset {} doesn't exist.", path.display()),
            DataSetError::AlreadyExists(ref path) => write!(f, "The directory {} already exists.", path.display()),
            DataSetError::ClassCount(count) => write!(f, "At least two classes are required, found {}.", count),
            DataSetError::ClassMismatch => write!(f, "The subsets don't contain the same classes."),
            DataSetError::NoSamples(ref path) => write!(f, "No samples were found in {}.", path.display()),
            DataSetError::DimensionMismatch => write!(f, "The number of input and output samples differ."),
        }
    }
}

impl std::error::Error for DataSetError {}

impl std::convert::From<io::Error> for DataSetError {
    fn from(error: io::Error) -> DataSetError {
        DataSetError::Io(error)
    }
}

impl std::convert::From<image::ImageError> for DataSetError {
    fn from(error: image::ImageError) -> DataSetError {
        DataSetError::Image(error)
    }
}

impl std::convert::From<walkdir::Error> for DataSetError {
    fn from(error: walkdir::Error) -> DataSetError {
        DataSetError::Io(error.into())
    }
}


/// Defines the samples a network is trained and evaluated on.
///
/// The samples are stacked along the fourth dimension of the tensors.
pub trait DataSet {
    fn input_shape(&self) -> Dim;
    fn output_shape(&self) -> Dim;
    fn num_train_samples(&self) -> u64;
    fn num_valid_samples(&self) -> u64;
    fn classes(&self) -> Option<Vec<String>>;
    fn x_train(&self) -> &Tensor;
    fn y_train(&self) -> &Tensor;
    fn x_valid(&self) -> Option<&Tensor>;
    fn y_valid(&self) -> Option<&Tensor>;
    fn x_test(&self) -> Option<&Tensor>;
    fn y_test(&self) -> Option<&Tensor>;
}


/// Filters out hidden entries (typically .DS_Store on macos). The root of a walk is never hidden.
pub(crate) fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}


#[cfg(test)]
mod tests {
    use std::fs;
    use walkdir::WalkDir;
    use crate::data::is_hidden;

    #[test]
    fn test_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".samples");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.png"), "a").unwrap();
        fs::write(root.join(".DS_Store"), "").unwrap();

        let names: Vec<String> = WalkDir::new(&root).into_iter().filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png"]);
    }
}
