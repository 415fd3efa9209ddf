//! Staged output
//!
//! Everything a build emits is collected in memory first and written in one
//! pass. A failed write removes every file this commit already wrote.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{BuildError, Result};

/// A file waiting to be written
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Path relative to the output directory
    pub name: String,
    pub contents: String,
}

/// Files staged for one output directory
#[derive(Debug)]
pub struct OutputStage {
    dir: PathBuf,
    files: Vec<StagedFile>,
}

impl OutputStage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    pub fn stage(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.files.push(StagedFile {
            name: name.into(),
            contents: contents.into(),
        });
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Write every staged file; all or nothing
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir).map_err(|source| BuildError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = self.dir.join(&file.name);
            let result = match path.parent() {
                Some(parent) if parent != self.dir => fs::create_dir_all(parent),
                _ => Ok(()),
            }
            .and_then(|_| fs::write(&path, &file.contents));

            if let Err(source) = result {
                rollback(&written);
                return Err(BuildError::Write { path, source });
            }
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }
}

fn rollback(written: &[PathBuf]) {
    for path in written {
        if let Err(err) = fs::remove_file(path) {
            warn!("Could not remove {} after failed build: {}", path.display(), err);
        }
    }
}
