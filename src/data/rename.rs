//! Sequential renaming of the samples of a class.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{is_hidden, DataSetError};

/// Renames every file of `dir` to `{class}.{i}.{extension}`, `i` starting at 1.
///
/// Files are numbered in the order of their names and hidden files are skipped. The files are
/// first moved to temporary names so that a target name held by another file of the directory is
/// never overwritten. If a rename fails, the files get their original names back.
///
/// # Return value
///
/// The number of renamed files.
pub fn rename_sequential(dir: &Path, class: &str, extension: &str) -> Result<usize, DataSetError> {
    if !dir.is_dir() {
        return Err(DataSetError::PathDoesNotExist(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by(|a, b| a.file_name().cmp(b.file_name())).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let temporary: Vec<PathBuf> = (0..files.len()).map(|i| dir.join(format!(".rename-{}.tmp", i))).collect();
    let targets: Vec<PathBuf> = (1..=files.len()).map(|i| dir.join(format!("{}.{}.{}", class, i, extension))).collect();

    rename_all(&files, &temporary)?;
    if let Err(err) = rename_all(&temporary, &targets) {
        let _ = rename_all(&temporary, &files);
        return Err(err.into());
    }
    Ok(files.len())
}

/// Renames `from[i]` to `to[i]` in order. On failure the files already renamed are moved back.
fn rename_all(from: &[PathBuf], to: &[PathBuf]) -> io::Result<()> {
    for (i, (source, target)) in from.iter().zip(to).enumerate() {
        if let Err(err) = fs::rename(source, target) {
            for (source, target) in from.iter().zip(to).take(i) {
                let _ = fs::rename(target, source);
            }
            return Err(err);
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::fs;
    use crate::data::rename::rename_sequential;

    #[test]
    fn test_rename_sequential() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), "b").unwrap();
        fs::write(dir.path().join("a.jpg"), "a").unwrap();
        // Already holds the name the second file will get
        fs::write(dir.path().join("ladybug.2.jpg"), "c").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let count = rename_sequential(dir.path(), "ladybug", "jpg").unwrap();
        assert_eq!(count, 3);
        assert_eq!(fs::read_to_string(dir.path().join("ladybug.1.jpg")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dir.path().join("ladybug.2.jpg")).unwrap(), "b");
        assert_eq!(fs::read_to_string(dir.path().join("ladybug.3.jpg")).unwrap(), "c");
        assert!(dir.path().join("nested").is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_failed_rename_restores_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), "a").unwrap();
        fs::write(dir.path().join("b.jpg"), "b").unwrap();
        // A directory cannot be replaced by the second file
        fs::create_dir(dir.path().join("ladybug.2.jpg")).unwrap();

        assert!(rename_sequential(dir.path(), "ladybug", "jpg").is_err());
        assert_eq!(fs::read_to_string(dir.path().join("a.jpg")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dir.path().join("b.jpg")).unwrap(), "b");
        assert!(!dir.path().join("ladybug.1.jpg").exists());
        assert!(dir.path().join("ladybug.2.jpg").is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rename_sequential(&dir.path().join("missing"), "ladybug", "jpg").is_err());
    }
}
