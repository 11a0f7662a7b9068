//! Batch resizing of a directory tree of images.
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::{is_hidden, DataSetError};

/// Size the data set images are resized to by default, as (width, height).
pub const DEFAULT_SIZE: (u32, u32) = (280, 210);

/// Resizes every image found recursively in `source` and saves it in `output`.
///
/// The output directory is flat: images are saved under their file name, so files with the same
/// name in different subdirectories overwrite each other.
///
/// # Return value
///
/// The number of resized images.
pub fn resize_tree(source: &Path, output: &Path, (width, height): (u32, u32)) -> Result<usize, DataSetError> {
    if !source.exists() {
        return Err(DataSetError::PathDoesNotExist(source.to_path_buf()));
    }
    fs::create_dir_all(output)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by(|a, b| a.file_name().cmp(b.file_name())).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:50}] {pos}/{len}")
        .progress_chars("##-"));

    for file in files.iter() {
        if let Some(name) = file.file_name() {
            let img = image::open(file)?;
            img.resize_exact(width, height, FilterType::CatmullRom).save(output.join(name))?;
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_and_clear();
    Ok(files.len())
}
