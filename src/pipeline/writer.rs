//! Output directory ownership for one conversion.
//!
//! [`OutputDir`] is created at the start of a conversion and removed again
//! when it is dropped without [`OutputDir::commit`] — on an early `?` return
//! as well as on a panic. If the directory already existed, only the files
//! this run wrote are removed.
//!
//! Every file is written through a temp file in the same directory and then
//! renamed, so a reader never observes a half-written screenshot or document.

use crate::error::Mht2MdError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The output directory of an in-flight conversion.
#[derive(Debug)]
pub struct OutputDir {
    path: PathBuf,
    created: bool,
    written: Vec<PathBuf>,
    committed: bool,
}

impl OutputDir {
    /// Create `path` (and missing parents). An existing directory is reused.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, Mht2MdError> {
        let path = path.into();
        let existed = path.is_dir();
        fs::create_dir_all(&path).map_err(|e| Mht2MdError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
        debug!(
            "Output directory {} ({})",
            path.display(),
            if existed { "reused" } else { "created" }
        );
        Ok(Self {
            path,
            created: !existed,
            written: Vec::new(),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically write `name` inside the directory, replacing any existing file.
    pub fn write(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, Mht2MdError> {
        let target = self.path.join(name);
        let fail = |source: std::io::Error| Mht2MdError::OutputWriteFailed {
            path: target.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.path).map_err(fail)?;
        tmp.write_all(bytes).map_err(fail)?;
        tmp.persist(&target).map_err(|e| fail(e.error))?;

        if !self.written.contains(&target) {
            self.written.push(target.clone());
        }
        Ok(target)
    }

    /// Keep the directory and its contents; hand ownership to the caller.
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for OutputDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.created {
            match fs::remove_dir_all(&self.path) {
                Ok(()) => info!("Cleaned up incomplete output directory {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove incomplete output directory {}: {}",
                    self.path.display(),
                    e
                ),
            }
            return;
        }
        for file in &self.written {
            if let Err(e) = fs::remove_file(file) {
                warn!("Failed to remove partial output {}: {}", file.display(), e);
            }
        }
        if !self.written.is_empty() {
            info!(
                "Removed {} partial files from existing directory {}",
                self.written.len(),
                self.path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_without_commit_removes_created_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir_path = root.path().join("capture");
        {
            let mut dir = OutputDir::create(&dir_path).unwrap();
            dir.write("a.md", b"# a").unwrap();
            assert!(dir_path.join("a.md").exists());
        }
        assert!(!dir_path.exists());
    }

    #[test]
    fn commit_keeps_contents() {
        let root = tempfile::tempdir().unwrap();
        let dir_path = root.path().join("capture");
        let mut dir = OutputDir::create(&dir_path).unwrap();
        let written = dir.write("a.md", b"# a").unwrap();
        let kept = dir.commit();
        assert_eq!(kept, dir_path);
        assert_eq!(std::fs::read(written).unwrap(), b"# a");
    }

    #[test]
    fn existing_dir_only_loses_written_files() {
        let root = tempfile::tempdir().unwrap();
        let dir_path = root.path().join("capture");
        std::fs::create_dir(&dir_path).unwrap();
        std::fs::write(dir_path.join("keep.txt"), b"mine").unwrap();
        {
            let mut dir = OutputDir::create(&dir_path).unwrap();
            dir.write("screenshot0001.png", b"png").unwrap();
            dir.write("screenshot0001.png", b"png again").unwrap();
        }
        assert!(dir_path.join("keep.txt").exists());
        assert!(!dir_path.join("screenshot0001.png").exists());
    }

    #[test]
    fn write_replaces_existing_file() {
        let root = tempfile::tempdir().unwrap();
        let mut dir = OutputDir::create(root.path().join("c")).unwrap();
        dir.write("x", b"first").unwrap();
        let p = dir.write("x", b"second").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"second");
        dir.commit();
    }
}
