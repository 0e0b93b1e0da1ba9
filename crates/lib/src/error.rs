//! Error types for the provisioning pipeline.
//!
//! Two kinds exist: configuration errors, raised at resolution time before
//! any destructive action, and step errors, raised from inside one dependency
//! step. A step error is wrapped with the identity of the failing dependency
//! and terminates the run; nothing is retried or skipped.

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::ExecError;
use crate::source::SourceError;

/// Errors raised while resolving the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The platform name matches no supported platform.
  #[error("unsupported platform '{0}'")]
  UnsupportedPlatform(String),

  /// The architecture is not offered by the resolved platform.
  #[error("platform '{platform}' does not support architecture '{arch}'")]
  UnsupportedArchitecture { platform: String, arch: String },

  /// The build-system name matches no supported build tool.
  #[error("unsupported build system '{0}'")]
  UnsupportedBuildSystem(String),

  /// The requested build root cannot be claimed.
  #[error("invalid build root '{0}'")]
  InvalidBuildRoot(PathBuf),
}

/// Errors raised from inside one dependency step.
#[derive(Debug, Error)]
pub enum StepError {
  /// An external command failed to start or exited non-zero.
  #[error(transparent)]
  Exec(#[from] ExecError),

  /// Release-archive download or extraction failed.
  #[error(transparent)]
  Archive(#[from] SourceError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Resolution failed before anything was touched.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// A dependency step failed and stopped the run.
  #[error("step {index} ({dependency}) failed: {source}")]
  Step {
    dependency: &'static str,
    /// Zero-based position in the fixed dependency sequence.
    index: usize,
    #[source]
    source: StepError,
  },

  /// Prerequisite installation through the host package manager failed.
  #[error("failed to install prerequisite '{package}': {source}")]
  Prerequisite {
    package: String,
    #[source]
    source: ExecError,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
