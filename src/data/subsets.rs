//! Splits a flat directory of numbered samples into training, validation and test subsets.
use std::fs;
use std::ops::Range;
use std::path::Path;

use super::image_data::{TEST_SUBSET, TRAIN_SUBSET, VALID_SUBSET};
use super::DataSetError;

/// A subset and the half-open range of sample numbers it receives.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetSpec {
    pub name: String,
    pub range: Range<usize>,
}

impl SubsetSpec {
    pub fn new(name: &str, range: Range<usize>) -> SubsetSpec {
        SubsetSpec { name: name.to_string(), range }
    }
}

/// Classes of the ladybug classifier.
pub const DEFAULT_CLASSES: [&str; 2] = ["ladybug", "notladybug"];

/// Extension of the samples of the ladybug data set.
pub const DEFAULT_EXTENSION: &str = "jpeg";

/// Split of the ladybug data set: samples 1 to 1349 for training, 1350 to 1394 for validation
/// and 1395 to 1396 for testing.
pub fn default_subsets() -> Vec<SubsetSpec> {
    vec![
        SubsetSpec::new(TRAIN_SUBSET, 1..1350),
        SubsetSpec::new(VALID_SUBSET, 1350..1395),
        SubsetSpec::new(TEST_SUBSET, 1395..1397),
    ]
}

/// Copies the samples `{class}.{i}.{extension}` of `source` into `target/{subset}/{class}`.
///
/// Every subset directory is created and must not exist beforehand. A missing sample aborts
/// the copy.
///
/// # Return value
///
/// The number of copied files.
pub fn create_subsets(source: &Path,
                      target: &Path,
                      classes: &[&str],
                      extension: &str,
                      subsets: &[SubsetSpec],
                      verbose: bool,
) -> Result<usize, DataSetError> {
    if !source.exists() {
        return Err(DataSetError::PathDoesNotExist(source.to_path_buf()));
    }

    let mut count = 0;
    for subset in subsets {
        for class in classes {
            let dir = target.join(&subset.name).join(class);
            if dir.exists() {
                return Err(DataSetError::AlreadyExists(dir));
            }
            fs::create_dir_all(&dir)?;

            for i in subset.range.clone() {
                let file_name = format!("{}.{}.{}", class, i, extension);
                fs::copy(source.join(&file_name), dir.join(&file_name))?;
                count += 1;
            }
        }
        if verbose { println!("subset \"{}\" created", subset.name); }
    }
    Ok(count)
}


#[cfg(test)]
mod tests {
    use std::fs;
    use crate::data::subsets::*;
    use crate::data::DataSetError;

    #[test]
    fn test_create_subsets() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        for class in DEFAULT_CLASSES.iter() {
            for i in 1..6 {
                fs::write(source.path().join(format!("{}.{}.jpeg", class, i)), format!("{}", i)).unwrap();
            }
        }

        let subsets = vec![SubsetSpec::new("train", 1..4), SubsetSpec::new("validation", 4..5), SubsetSpec::new("test", 5..6)];
        let count = create_subsets(source.path(), target.path(), &DEFAULT_CLASSES, "jpeg", &subsets, false).unwrap();
        assert_eq!(count, 10);

        let train = target.path().join("train/ladybug");
        assert_eq!(fs::read_dir(&train).unwrap().count(), 3);
        assert!(train.join("ladybug.3.jpeg").exists());
        assert_eq!(fs::read_to_string(target.path().join("test/notladybug/notladybug.5.jpeg")).unwrap(), "5");

        // The subsets cannot be created twice
        match create_subsets(source.path(), target.path(), &DEFAULT_CLASSES, "jpeg", &subsets, false) {
            Err(DataSetError::AlreadyExists(_)) => {},
            _ => panic!("expected an existing directory error"),
        }
    }

    #[test]
    fn test_default_subsets_are_contiguous() {
        let subsets = default_subsets();
        assert_eq!(subsets[0].range.start, 1);
        assert_eq!(subsets[0].range.end, subsets[1].range.start);
        assert_eq!(subsets[1].range.end, subsets[2].range.start);
        assert_eq!(subsets[2].range.end, 1397);
    }
}
