//! Completion signal files.
//!
//! The end of a run is signalled by creating an empty file. The process waiting for the run polls
//! for the file and removes it once seen.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::Error;

/// Name of the completion file when none is configured.
pub const DEFAULT_SENTINEL: &str = "DONE";

/// Creates the empty completion file, along with its parent directories.
pub fn signal_completion(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::File::create(path)?;
    Ok(())
}

/// Removes a stale completion file. A missing file is not an error.
pub fn clear(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::from(err)),
    }
}

/// Blocks until the completion file exists, then removes it.
pub fn wait_for_completion(path: &Path, poll_interval: Duration) -> Result<(), Error> {
    while !path.exists() {
        thread::sleep(poll_interval);
    }
    clear(path)
}

/// Waits for the completion file at most `timeout`.
///
/// # Return value
///
/// True if the file appeared (it is then removed), false if the timeout elapsed.
pub fn wait_for_completion_timeout(path: &Path, poll_interval: Duration, timeout: Duration) -> Result<bool, Error> {
    let start = Instant::now();
    loop {
        if path.exists() {
            clear(path)?;
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }
        thread::sleep(poll_interval);
    }
}

/// Returns the completion file of a numbered run, named after the iteration number.
pub fn signal_path_for_iteration(dir: &Path, iteration: usize) -> PathBuf {
    dir.join(iteration.to_string())
}
