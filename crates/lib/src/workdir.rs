//! Explicit working-directory values for pipeline steps.
//!
//! The pipeline never changes the process working directory. Each step
//! derives the directories its commands run in from the build root and
//! passes them to the runner explicitly, so the effective directory is the
//! build root again the moment a step ends, however it ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A directory commands run in, derived from the build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cwd {
  path: PathBuf,
}

impl Cwd {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Enter a sub-directory that the source tree is expected to provide.
  pub fn enter(&self, sub: impl AsRef<Path>) -> Cwd {
    Cwd {
      path: self.path.join(sub),
    }
  }

  /// Create a sub-directory and enter it.
  pub fn create_enter(&self, sub: impl AsRef<Path>) -> io::Result<Cwd> {
    let path = self.path.join(sub);
    fs::create_dir_all(&path)?;
    Ok(Cwd { path })
  }
}
