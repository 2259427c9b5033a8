use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use putt_traits::{BoxError, CourseStore};

use crate::error::{HwError, Result};

/// Replace `path` with `bytes` so a crash leaves either the old or the new
/// file, never a torn one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Course shape persisted to a single file.
#[derive(Debug, Clone)]
pub struct FileCourseStore {
    path: PathBuf,
}

impl FileCourseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<u8>> {
        if self.path.is_dir() {
            return Err(HwError::Storage(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            // Never saved yet.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CourseStore for FileCourseStore {
    fn write_course_state(&mut self, state: &[u8]) -> std::result::Result<(), BoxError> {
        write_atomic(&self.path, state).map_err(HwError::from)?;
        tracing::debug!(path = %self.path.display(), len = state.len(), "course state saved");
        Ok(())
    }

    fn read_course_state(&mut self) -> std::result::Result<Vec<u8>, BoxError> {
        Ok(self.read()?)
    }
}
