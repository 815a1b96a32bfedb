// Whole-file loading for short sound clips

use crate::error::{AudioError, Result};
use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Retry an I/O step for as long as it fails with `Interrupted`
fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                log::trace!("I/O interrupted, retrying");
                continue;
            }
            other => return other,
        }
    }
}

/// Read the entire file at `path` into a buffer sized exactly to the file.
///
/// Empty files, I/O failures and short reads are all errors; a partially
/// filled buffer is never returned.
pub fn load_file_contents(path: &Path) -> Result<Vec<u8>> {
    let mut file = retry_interrupted(|| File::open(path)).map_err(|e| {
        AudioError::IoError(format!("Failed to open {}: {}", path.display(), e))
    })?;
    if file.metadata()?.is_dir() {
        return Err(AudioError::IoError(format!(
            "{} is a directory",
            path.display()
        )));
    }

    let size = retry_interrupted(|| file.seek(SeekFrom::End(0)))?;
    if size == 0 {
        return Err(AudioError::IoError(format!(
            "{} is empty",
            path.display()
        )));
    }
    let size = usize::try_from(size).map_err(|_| {
        AudioError::IoError(format!("{} is too large to buffer", path.display()))
    })?;

    retry_interrupted(|| file.seek(SeekFrom::Start(0)))?;

    let mut contents = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let read = retry_interrupted(|| file.read(&mut contents[filled..]))?;
        if read == 0 {
            return Err(AudioError::IoError(format!(
                "Short read on {}: {} of {} bytes",
                path.display(),
                filled,
                size
            )));
        }
        filled += read;
    }

    log::debug!("Loaded {} ({} bytes)", path.display(), size);
    Ok(contents)
}
